use mongodb::Database;
use safetrack_config::Settings;
use safetrack_services::{
    ActionService, AuthService, NotificationDispatcher,
    dao::user::UserDao,
    notify::{EmailNotifier, FanOut, InAppNotifier, NotificationError, NotificationSink},
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub actions: Arc<ActionService>,
}

impl AppState {
    /// Must be called inside a tokio runtime: starts the notification consumer.
    pub fn new(db: Database, settings: &Settings) -> Result<Self, NotificationError> {
        let sink = notification_sink(&db, settings)?;
        Ok(Self::with_sink(db, settings, sink))
    }

    /// Same wiring, with the outbound notification service supplied by the caller.
    pub fn with_sink(db: Database, settings: &Settings, sink: Arc<dyn NotificationSink>) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let users = Arc::new(UserDao::new(&db));
        let dispatcher =
            NotificationDispatcher::spawn(users.clone(), sink, settings.notifications.enabled);
        let actions = Arc::new(ActionService::new(&db, users.clone(), dispatcher));

        Self {
            auth,
            users,
            actions,
        }
    }
}

/// In-app first, then email when SMTP is configured.
pub fn notification_sink(
    db: &Database,
    settings: &Settings,
) -> Result<Arc<dyn NotificationSink>, NotificationError> {
    let mut sinks = FanOut::new().with("in_app", Arc::new(InAppNotifier::new(db)));
    if settings.email.enabled {
        info!(host = %settings.email.smtp_host, "Assignment emails enabled");
        sinks = sinks.with("email", Arc::new(EmailNotifier::smtp(&settings.email)?));
    }
    Ok(Arc::new(sinks))
}
