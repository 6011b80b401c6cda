use crate::{
    Alert, AlertFilter, ChangePassword, Hive, HiveChanges, HiveDraft, Inspection,
    InspectionDraft, Measurement, MeasurementWindow, Notification, NotificationSettings,
    NotificationTemplate, Sensor, SensorChanges, SensorDraft, SensorStats, Service,
    SettingsChanges, SettingsDraft, TemplateChanges, TemplateDraft, TokenRequest, TokenResponse,
    UserProfile,
};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

/// HTTP Methods for API Requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether requests with this method carry the serialized request body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a request body is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    Form,
}

/// A trait that defines the request-response relationship and metadata for an API endpoint.
///
/// Fields marked `#[serde(skip)]` only feed the path; everything else is the body.
pub trait ApiRequest: Serialize {
    /// The response type returned by this request.
    type Response: DeserializeOwned;
    /// The HTTP method.
    const METHOD: HttpMethod;
    /// The service whose client carries the request.
    const SERVICE: Service;
    const ENCODING: BodyEncoding = BodyEncoding::Json;

    /// The URL path relative to the service base URL.
    fn path(&self) -> String;

    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

// =========================================================
// Auth service
// =========================================================

impl ApiRequest for TokenRequest {
    type Response = TokenResponse;
    const METHOD: HttpMethod = HttpMethod::Post;
    const SERVICE: Service = Service::Auth;
    const ENCODING: BodyEncoding = BodyEncoding::Form;

    fn path(&self) -> String {
        "/token".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentUser;

impl ApiRequest for CurrentUser {
    type Response = UserProfile;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Auth;

    fn path(&self) -> String {
        "/users/me".to_string()
    }
}

impl ApiRequest for ChangePassword {
    type Response = IgnoredAny;
    const METHOD: HttpMethod = HttpMethod::Post;
    const SERVICE: Service = Service::Auth;

    fn path(&self) -> String {
        "/change-password".to_string()
    }
}

// =========================================================
// Hive service
// =========================================================

#[derive(Debug, Serialize)]
pub struct ListHives;

impl ApiRequest for ListHives {
    type Response = Vec<Hive>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Hive;

    fn path(&self) -> String {
        "/hives/".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct GetHive {
    #[serde(skip)]
    pub id: i64,
}

impl ApiRequest for GetHive {
    type Response = Hive;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Hive;

    fn path(&self) -> String {
        format!("/hives/{}", self.id)
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreateHive(pub HiveDraft);

impl ApiRequest for CreateHive {
    type Response = Hive;
    const METHOD: HttpMethod = HttpMethod::Post;
    const SERVICE: Service = Service::Hive;

    fn path(&self) -> String {
        "/hives/".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateHive {
    #[serde(skip)]
    pub id: i64,
    #[serde(flatten)]
    pub changes: HiveChanges,
}

impl ApiRequest for UpdateHive {
    type Response = Hive;
    const METHOD: HttpMethod = HttpMethod::Put;
    const SERVICE: Service = Service::Hive;

    fn path(&self) -> String {
        format!("/hives/{}", self.id)
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteHive {
    #[serde(skip)]
    pub id: i64,
}

impl ApiRequest for DeleteHive {
    type Response = IgnoredAny;
    const METHOD: HttpMethod = HttpMethod::Delete;
    const SERVICE: Service = Service::Hive;

    fn path(&self) -> String {
        format!("/hives/{}", self.id)
    }
}

#[derive(Debug, Serialize)]
pub struct ListInspections {
    #[serde(skip)]
    pub hive_id: i64,
}

impl ApiRequest for ListInspections {
    type Response = Vec<Inspection>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Hive;

    fn path(&self) -> String {
        format!("/hives/{}/inspections/", self.hive_id)
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreateInspection(pub InspectionDraft);

impl ApiRequest for CreateInspection {
    type Response = Inspection;
    const METHOD: HttpMethod = HttpMethod::Post;
    const SERVICE: Service = Service::Hive;

    fn path(&self) -> String {
        "/inspections/".to_string()
    }
}

// =========================================================
// Monitoring service
// =========================================================

#[derive(Debug, Serialize)]
pub struct ListSensors;

impl ApiRequest for ListSensors {
    type Response = Vec<Sensor>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        "/sensors/".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct ListHiveSensors {
    #[serde(skip)]
    pub hive_id: i64,
}

impl ApiRequest for ListHiveSensors {
    type Response = Vec<Sensor>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        format!("/hives/{}/sensors/", self.hive_id)
    }
}

#[derive(Debug, Serialize)]
pub struct GetSensor {
    #[serde(skip)]
    pub id: i64,
}

impl ApiRequest for GetSensor {
    type Response = Sensor;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        format!("/sensors/{}", self.id)
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreateSensor(pub SensorDraft);

impl ApiRequest for CreateSensor {
    type Response = Sensor;
    const METHOD: HttpMethod = HttpMethod::Post;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        "/sensors/".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateSensor {
    #[serde(skip)]
    pub id: i64,
    #[serde(flatten)]
    pub changes: SensorChanges,
}

impl ApiRequest for UpdateSensor {
    type Response = Sensor;
    const METHOD: HttpMethod = HttpMethod::Put;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        format!("/sensors/{}/", self.id)
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteSensor {
    #[serde(skip)]
    pub id: i64,
}

impl ApiRequest for DeleteSensor {
    type Response = IgnoredAny;
    const METHOD: HttpMethod = HttpMethod::Delete;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        format!("/sensors/{}/", self.id)
    }
}

#[derive(Debug, Serialize)]
pub struct GetSensorStats {
    #[serde(skip)]
    pub sensor_id: i64,
}

impl ApiRequest for GetSensorStats {
    type Response = SensorStats;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        format!("/sensors/{}/stats/", self.sensor_id)
    }
}

#[derive(Debug, Serialize)]
pub struct ListMeasurements {
    #[serde(skip)]
    pub sensor_id: i64,
    #[serde(skip)]
    pub window: MeasurementWindow,
}

impl ApiRequest for ListMeasurements {
    type Response = Vec<Measurement>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        format!("/sensors/{}/measurements/", self.sensor_id)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.window.limit.to_string())];
        if let Some(start) = self.window.start {
            params.push(("start_date", start.to_rfc3339()));
        }
        if let Some(end) = self.window.end {
            params.push(("end_date", end.to_rfc3339()));
        }
        params
    }
}

#[derive(Debug, Serialize)]
pub struct ListAlerts {
    #[serde(skip)]
    pub filter: AlertFilter,
}

impl ApiRequest for ListAlerts {
    type Response = Vec<Alert>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        "/alerts/".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(hive_id) = self.filter.hive_id {
            params.push(("hive_id", hive_id.to_string()));
        }
        if let Some(sensor_id) = self.filter.sensor_id {
            params.push(("sensor_id", sensor_id.to_string()));
        }
        params
    }
}

#[derive(Debug, Serialize)]
pub struct ResolveAlert {
    #[serde(skip)]
    pub id: i64,
}

impl ApiRequest for ResolveAlert {
    type Response = Alert;
    const METHOD: HttpMethod = HttpMethod::Put;
    const SERVICE: Service = Service::Monitoring;

    fn path(&self) -> String {
        format!("/alerts/{}/resolve/", self.id)
    }
}

// =========================================================
// Notification service
// =========================================================

#[derive(Debug, Serialize)]
pub struct ListNotifications {
    #[serde(skip)]
    pub limit: u32,
}

impl Default for ListNotifications {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

impl ApiRequest for ListNotifications {
    type Response = Vec<Notification>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        "/notifications/".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![("limit", self.limit.to_string())]
    }
}

#[derive(Debug, Serialize)]
pub struct ListPendingNotifications;

impl ApiRequest for ListPendingNotifications {
    type Response = Vec<Notification>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        "/notifications/pending/".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct GetSettings;

impl ApiRequest for GetSettings {
    type Response = NotificationSettings;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        "/settings/me/".to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreateSettings(pub SettingsDraft);

impl ApiRequest for CreateSettings {
    type Response = NotificationSettings;
    const METHOD: HttpMethod = HttpMethod::Post;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        "/settings/".to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct UpdateSettings(pub SettingsChanges);

impl ApiRequest for UpdateSettings {
    type Response = NotificationSettings;
    const METHOD: HttpMethod = HttpMethod::Put;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        "/settings/me/".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct ListTemplates;

impl ApiRequest for ListTemplates {
    type Response = Vec<NotificationTemplate>;
    const METHOD: HttpMethod = HttpMethod::Get;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        "/templates/".to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CreateTemplate(pub TemplateDraft);

impl ApiRequest for CreateTemplate {
    type Response = NotificationTemplate;
    const METHOD: HttpMethod = HttpMethod::Post;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        "/templates/".to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateTemplate {
    #[serde(skip)]
    pub id: i64,
    #[serde(flatten)]
    pub changes: TemplateChanges,
}

impl ApiRequest for UpdateTemplate {
    type Response = NotificationTemplate;
    const METHOD: HttpMethod = HttpMethod::Put;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        format!("/templates/{}", self.id)
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteTemplate {
    #[serde(skip)]
    pub id: i64,
}

impl ApiRequest for DeleteTemplate {
    type Response = IgnoredAny;
    const METHOD: HttpMethod = HttpMethod::Delete;
    const SERVICE: Service = Service::Notification;

    fn path(&self) -> String {
        format!("/templates/{}", self.id)
    }
}
