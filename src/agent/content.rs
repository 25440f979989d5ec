//! Splitting inbound text into prose and image URLs for vision models.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Message;

/// Most images forwarded per message; later URLs are dropped.
pub const MAX_IMAGES: usize = 10;

static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S+\.(?:jpg|jpeg|png|gif|webp)(?:\?\S*)?")
        .expect("Invalid image URL regex")
});

/// Build the user message for `text`.
///
/// Image URLs are moved out of the text into [`Message::images`], keeping the
/// first [`MAX_IMAGES`]. Every matched URL is removed from the text, including
/// the ones past the limit. Text without image URLs is passed through as is.
pub fn user_message(text: &str) -> Message {
    let images: Vec<String> = IMAGE_URL
        .find_iter(text)
        .take(MAX_IMAGES)
        .map(|m| m.as_str().to_owned())
        .collect();
    if images.is_empty() {
        return Message::user(text);
    }
    let prose = IMAGE_URL.replace_all(text, "");
    Message::user_with_images(prose.trim(), images)
}
