use tracing::error;
use uuid::Uuid;

use osiris_types::events::ServerEvent;
use osiris_types::models::NotificationKind;

use crate::{AppState, blocking, convert};

/// Store a notification and push it to the recipient's open connections.
/// Nobody is notified about their own actions. Failures are logged, never
/// surfaced to the request that triggered them.
pub(crate) async fn notify(
    state: &AppState,
    recipient: Uuid,
    kind: NotificationKind,
    actor: Option<Uuid>,
    target: Option<Uuid>,
    body: String,
) {
    if actor == Some(recipient) {
        return;
    }

    let id = Uuid::new_v4().to_string();
    let result = blocking(state, move |db| {
        let row = db.insert_notification(
            &id,
            &recipient.to_string(),
            kind.as_str(),
            actor.map(|a| a.to_string()).as_deref(),
            target.map(|t| t.to_string()).as_deref(),
            &body,
        )?;
        Ok(convert::notification(row)?)
    })
    .await;

    match result {
        Ok(notification) => {
            state
                .dispatcher
                .send_to_user(recipient, ServerEvent::Notification { notification })
                .await;
        }
        Err(e) => error!("Failed to store {} notification for {}: {}", kind, recipient, e),
    }
}
