use super::{LoadState, Tracked, track};
use crate::client::ApiClientSet;
use crate::state::{Observable, SubscriptionId};
use apiary_shared::protocol::{
    CreateSettings, CreateTemplate, DeleteTemplate, GetSettings, ListNotifications,
    ListPendingNotifications, ListTemplates, UpdateSettings, UpdateTemplate,
};
use apiary_shared::{
    Notification, NotificationSettings, NotificationTemplate, SettingsChanges, SettingsDraft,
    TemplateChanges, TemplateDraft,
};
use std::rc::Rc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    pub settings: Option<NotificationSettings>,
    pub notifications: Vec<Notification>,
    pub pending: Vec<Notification>,
    pub templates: Vec<NotificationTemplate>,
    pub status: LoadState,
}

impl NotificationState {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}

impl Tracked for NotificationState {
    fn load_state(&mut self) -> &mut LoadState {
        &mut self.status
    }
}

pub struct NotificationStore {
    state: Observable<NotificationState>,
    clients: Rc<ApiClientSet>,
}

impl NotificationStore {
    pub fn new(clients: Rc<ApiClientSet>) -> Self {
        Self {
            state: Observable::default(),
            clients,
        }
    }

    pub fn snapshot(&self) -> NotificationState {
        self.state.get()
    }

    pub fn subscribe(&self, subscriber: impl Fn(&NotificationState) + 'static) -> SubscriptionId {
        self.state.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    // ---------------------------------------------------------
    // Settings
    // ---------------------------------------------------------

    pub async fn fetch_settings(&self) -> Option<NotificationSettings> {
        let request = GetSettings;
        track(
            &self.state,
            "fetch_settings",
            self.clients.call(&request),
            |s, settings: NotificationSettings| {
                s.settings = Some(settings.clone());
                settings
            },
        )
        .await
    }

    pub async fn create_settings(&self, draft: SettingsDraft) -> Option<NotificationSettings> {
        let request = CreateSettings(draft);
        track(
            &self.state,
            "create_settings",
            self.clients.call(&request),
            |s, settings: NotificationSettings| {
                s.settings = Some(settings.clone());
                settings
            },
        )
        .await
    }

    pub async fn update_settings(&self, changes: SettingsChanges) -> Option<NotificationSettings> {
        let request = UpdateSettings(changes);
        track(
            &self.state,
            "update_settings",
            self.clients.call(&request),
            |s, settings: NotificationSettings| {
                s.settings = Some(settings.clone());
                settings
            },
        )
        .await
    }

    // ---------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------

    pub async fn fetch_notifications(&self) {
        let request = ListNotifications::default();
        track(&self.state, "fetch_notifications", self.clients.call(&request), |s, list| {
            s.notifications = list;
        })
        .await;
    }

    pub async fn fetch_pending(&self) {
        let request = ListPendingNotifications;
        track(&self.state, "fetch_pending", self.clients.call(&request), |s, list| {
            s.pending = list;
        })
        .await;
    }

    /// Local only; the notification service has no read endpoint.
    pub fn mark_notification_read(&self, id: i64) -> bool {
        self.state.update(|s| {
            let mut found = false;
            for n in s.notifications.iter_mut().chain(s.pending.iter_mut()) {
                if n.id == id {
                    n.is_read = true;
                    found = true;
                }
            }
            found
        })
    }

    // ---------------------------------------------------------
    // Templates
    // ---------------------------------------------------------

    pub async fn fetch_templates(&self) {
        track(&self.state, "fetch_templates", self.clients.call(&ListTemplates), |s, list| {
            s.templates = list;
        })
        .await;
    }

    pub async fn create_template(&self, draft: TemplateDraft) -> Option<NotificationTemplate> {
        let request = CreateTemplate(draft);
        track(
            &self.state,
            "create_template",
            self.clients.call(&request),
            |s, template: NotificationTemplate| {
                s.templates.push(template.clone());
                template
            },
        )
        .await
    }

    pub async fn update_template(
        &self,
        id: i64,
        changes: TemplateChanges,
    ) -> Option<NotificationTemplate> {
        let request = UpdateTemplate { id, changes };
        track(
            &self.state,
            "update_template",
            self.clients.call(&request),
            |s, template: NotificationTemplate| {
                if let Some(entry) = s.templates.iter_mut().find(|t| t.id == id) {
                    *entry = template.clone();
                }
                template
            },
        )
        .await
    }

    pub async fn delete_template(&self, id: i64) -> bool {
        let request = DeleteTemplate { id };
        track(&self.state, "delete_template", self.clients.call(&request), |s, _| {
            s.templates.retain(|t| t.id != id);
        })
        .await
        .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::testing::{clients, url};
    use apiary_shared::protocol::HttpMethod;
    use apiary_shared::{Channel, Priority};
    use serde_json::{Value, json};

    fn notification(id: i64, is_read: bool) -> Value {
        json!({
            "id": id,
            "notification_type": "email",
            "priority": "high",
            "subject": "Hive 3 temperature",
            "body": "Temperature above threshold",
            "is_sent": true,
            "is_read": is_read
        })
    }

    fn settings(email: bool) -> Value {
        json!({
            "id": 1,
            "user_id": 7,
            "email_enabled": email,
            "sms_enabled": false,
            "push_enabled": true,
            "min_priority": "medium"
        })
    }

    #[tokio::test]
    async fn settings_round_trip_through_the_store() {
        let (http, clients) = clients();
        let store = NotificationStore::new(clients);
        http.mock_response(HttpMethod::Get, &url("/settings/me/"), 200, settings(true));
        http.mock_response(HttpMethod::Put, &url("/settings/me/"), 200, settings(false));

        assert!(store.fetch_settings().await.unwrap().email_enabled);

        let changes = SettingsChanges {
            email_enabled: Some(false),
            ..SettingsChanges::default()
        };
        let updated = store.update_settings(changes).await.unwrap();

        assert!(!updated.email_enabled);
        assert_eq!(store.snapshot().settings, Some(updated));
        assert_eq!(store.snapshot().settings.unwrap().min_priority, Priority::Medium);
    }

    #[tokio::test]
    async fn missing_settings_leave_state_empty() {
        let (http, clients) = clients();
        let store = NotificationStore::new(clients);
        http.mock_response(
            HttpMethod::Get,
            &url("/settings/me/"),
            404,
            json!({ "detail": "Settings not found" }),
        );

        assert!(store.fetch_settings().await.is_none());
        let state = store.snapshot();
        assert!(state.settings.is_none());
        assert_eq!(state.status.error.as_deref(), Some("Settings not found"));
    }

    #[tokio::test]
    async fn read_flags_are_local() {
        let (http, clients) = clients();
        let store = NotificationStore::new(clients);
        http.mock_response(
            HttpMethod::Get,
            &url("/notifications/"),
            200,
            json!([notification(1, false), notification(2, true)]),
        );
        store.fetch_notifications().await;
        assert_eq!(store.snapshot().unread_count(), 1);
        assert_eq!(
            http.last_request().unwrap().query,
            vec![("limit".to_string(), "100".to_string())]
        );

        let sent = http.requests.borrow().len();
        assert!(store.mark_notification_read(1));
        assert!(!store.mark_notification_read(9));

        assert_eq!(store.snapshot().unread_count(), 0);
        assert_eq!(http.requests.borrow().len(), sent);
    }

    #[tokio::test]
    async fn template_lifecycle() {
        let (http, clients) = clients();
        let store = NotificationStore::new(clients);
        let template = |subject: &str| {
            json!({
                "id": 4,
                "name": "alert",
                "subject": subject,
                "body": "{{message}}",
                "notification_type": "push"
            })
        };
        http.mock_response(HttpMethod::Post, &url("/templates/"), 200, template("Alert"));
        http.mock_response(HttpMethod::Put, &url("/templates/4"), 200, template("Urgent"));
        http.mock_response(HttpMethod::Delete, &url("/templates/4"), 200, json!({ "ok": true }));

        let created = store
            .create_template(TemplateDraft {
                name: "alert".into(),
                subject: "Alert".into(),
                body: "{{message}}".into(),
                notification_type: Channel::Push,
            })
            .await
            .unwrap();
        assert_eq!(created.notification_type, Channel::Push);

        let changes = TemplateChanges {
            subject: Some("Urgent".into()),
            ..TemplateChanges::default()
        };
        store.update_template(4, changes).await.unwrap();
        assert_eq!(store.snapshot().templates[0].subject, "Urgent");

        assert!(store.delete_template(4).await);
        assert!(store.snapshot().templates.is_empty());
    }
}
