use taskdeck_core::session::{SessionController, SessionTokens, StoredUser};
use taskdeck_core::session_store::{
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionStore, USER_KEY,
};
use tempfile::tempdir;

fn alice() -> StoredUser {
    StoredUser {
        user_id: 7,
        username: "alice".to_string(),
    }
}

#[test]
fn malformed_stored_session_recovers_to_logged_out() {
    let temp = tempdir().expect("tempdir");
    let store = SessionStore::open(temp.path()).expect("open store");
    store.set(USER_KEY, "{this is not json").expect("seed user");
    store.set(ACCESS_TOKEN_KEY, "abc").expect("seed access token");
    store.set(REFRESH_TOKEN_KEY, "def").expect("seed refresh token");

    let session = SessionController::activate(store).expect("activate");
    assert!(session.current_user().is_none());

    // Recovery purges every session key, not just the corrupt one.
    let store = SessionStore::open(temp.path()).expect("reopen store");
    assert_eq!(store.get(USER_KEY).expect("get user"), None);
    assert_eq!(store.get(ACCESS_TOKEN_KEY).expect("get access"), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).expect("get refresh"), None);
}

#[test]
fn login_is_visible_immediately_and_survives_restart() {
    let temp = tempdir().expect("tempdir");
    let store = SessionStore::open(temp.path()).expect("open store");
    let mut session = SessionController::activate(store).expect("activate");

    session
        .login(
            alice(),
            SessionTokens {
                access_token: Some("abc".to_string()),
                refresh_token: None,
            },
        )
        .expect("login");

    assert_eq!(session.current_user(), Some(&alice()));
    assert_eq!(
        session.access_token().expect("token"),
        Some("abc".to_string())
    );

    // A fresh activation on the same data dir recovers the same session.
    let reloaded = SessionController::activate(
        SessionStore::open(temp.path()).expect("reopen store"),
    )
    .expect("reactivate");
    assert_eq!(reloaded.current_user(), Some(&alice()));
}

#[test]
fn logout_is_idempotent_from_any_state() {
    let temp = tempdir().expect("tempdir");
    let store = SessionStore::open(temp.path()).expect("open store");
    let mut session = SessionController::activate(store).expect("activate");

    // Logged out already: still fine.
    session.logout().expect("logout while logged out");
    assert!(session.current_user().is_none());

    session
        .login(
            alice(),
            SessionTokens {
                access_token: Some("abc".to_string()),
                refresh_token: Some("def".to_string()),
            },
        )
        .expect("login");

    session.logout().expect("logout");
    session.logout().expect("second logout");
    assert!(session.current_user().is_none());
    assert_eq!(session.access_token().expect("token"), None);
}

#[test]
fn external_change_is_picked_up_on_resync() {
    let temp = tempdir().expect("tempdir");
    let mut watcher = SessionController::activate(
        SessionStore::open(temp.path()).expect("open store"),
    )
    .expect("activate watcher");
    let baseline = watcher.fingerprint().expect("fingerprint");

    // Another context on the same storage logs in.
    let mut other = SessionController::activate(
        SessionStore::open(temp.path()).expect("open second store"),
    )
    .expect("activate other");
    other
        .login(
            alice(),
            SessionTokens {
                access_token: Some("abc".to_string()),
                refresh_token: None,
            },
        )
        .expect("login elsewhere");

    assert_ne!(watcher.fingerprint().expect("fingerprint"), baseline);
    watcher.sync_from_store().expect("resync");
    assert_eq!(watcher.current_user(), Some(&alice()));

    // And the logout elsewhere is reflected too.
    other.logout().expect("logout elsewhere");
    watcher.sync_from_store().expect("resync after logout");
    assert!(watcher.current_user().is_none());
}
