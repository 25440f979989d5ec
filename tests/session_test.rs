//! Per-session turn serialisation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use vendora::SessionSerializer;

type Log = Arc<Mutex<Vec<String>>>;

async fn turn(sessions: Arc<SessionSerializer>, session: u64, name: &'static str, log: Log) {
    sessions
        .with_session_lock(session, || async {
            log.lock().unwrap().push(format!("{name} start"));
            tokio::time::sleep(Duration::from_millis(50)).await;
            log.lock().unwrap().push(format!("{name} end"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn same_session_turns_do_not_overlap() {
    let sessions = Arc::new(SessionSerializer::default());
    let log: Log = Arc::default();

    tokio::join!(
        turn(sessions.clone(), 7, "req1", log.clone()),
        turn(sessions.clone(), 7, "req2", log.clone()),
    );

    assert_eq!(
        *log.lock().unwrap(),
        vec!["req1 start", "req1 end", "req2 start", "req2 end"]
    );
}

#[tokio::test(start_paused = true)]
async fn distinct_sessions_run_concurrently() {
    let sessions = Arc::new(SessionSerializer::default());
    let log: Log = Arc::default();

    tokio::join!(
        turn(sessions.clone(), 1, "a", log.clone()),
        turn(sessions.clone(), 2, "b", log.clone()),
    );

    let log = log.lock().unwrap();
    assert_eq!(log[0], "a start");
    assert_eq!(log[1], "b start");
}

#[tokio::test(start_paused = true)]
async fn timed_out_turn_releases_the_session() {
    let sessions = Arc::new(SessionSerializer::default());
    let log: Log = Arc::default();

    let slow = tokio::time::timeout(
        Duration::from_millis(10),
        turn(sessions.clone(), 3, "slow", log.clone()),
    )
    .await;
    assert!(slow.is_err());
    assert!(!sessions.is_busy(3));

    turn(sessions.clone(), 3, "next", log.clone()).await;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["slow start", "next start", "next end"]
    );
}

#[tokio::test(start_paused = true)]
async fn lock_registry_is_swept() {
    let sessions = Arc::new(SessionSerializer::new(4));
    for session in 0..20 {
        sessions.with_session_lock(session, || async {}).await;
    }
    assert!(sessions.len() <= 5, "registry grew to {}", sessions.len());
}
