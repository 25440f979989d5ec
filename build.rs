use vergen_gitcl::{Emitter, Gitcl};

// Only the git metadata feeds the reported version; outside a checkout the
// variables are simply not emitted.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let git = Gitcl::builder().branch(true).sha(true).dirty(true).build();
    Emitter::default().add_instructions(&git)?.emit()?;
    Ok(())
}
