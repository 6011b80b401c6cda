use super::{LoadState, Tracked, track};
use crate::client::ApiClientSet;
use crate::state::{Observable, SubscriptionId};
use apiary_shared::protocol::{
    CreateSensor, DeleteSensor, GetSensorStats, ListAlerts, ListHiveSensors, ListMeasurements,
    ListSensors, ResolveAlert, UpdateSensor,
};
use apiary_shared::{
    Alert, AlertFilter, Measurement, MeasurementWindow, Sensor, SensorChanges, SensorDraft,
    SensorStats,
};
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitoringState {
    pub sensors: Vec<Sensor>,
    pub measurements: Vec<Measurement>,
    pub alerts: Vec<Alert>,
    pub selected_sensor: Option<Sensor>,
    pub status: LoadState,
}

impl Tracked for MonitoringState {
    fn load_state(&mut self) -> &mut LoadState {
        &mut self.status
    }
}

pub struct MonitoringStore {
    state: Observable<MonitoringState>,
    clients: Rc<ApiClientSet>,
}

impl MonitoringStore {
    pub fn new(clients: Rc<ApiClientSet>) -> Self {
        Self {
            state: Observable::default(),
            clients,
        }
    }

    pub fn snapshot(&self) -> MonitoringState {
        self.state.get()
    }

    pub fn subscribe(&self, subscriber: impl Fn(&MonitoringState) + 'static) -> SubscriptionId {
        self.state.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    // ---------------------------------------------------------
    // Sensors
    // ---------------------------------------------------------

    pub async fn fetch_sensors(&self) {
        track(&self.state, "fetch_sensors", self.clients.call(&ListSensors), |s, sensors| {
            s.sensors = sensors;
        })
        .await;
    }

    pub async fn fetch_hive_sensors(&self, hive_id: i64) {
        let request = ListHiveSensors { hive_id };
        track(&self.state, "fetch_hive_sensors", self.clients.call(&request), |s, sensors| {
            s.sensors = sensors;
        })
        .await;
    }

    pub async fn create_sensor(&self, draft: SensorDraft) -> Option<Sensor> {
        let request = CreateSensor(draft);
        track(&self.state, "create_sensor", self.clients.call(&request), |s, sensor: Sensor| {
            s.sensors.push(sensor.clone());
            sensor
        })
        .await
    }

    pub async fn update_sensor(&self, id: i64, changes: SensorChanges) -> Option<Sensor> {
        let request = UpdateSensor { id, changes };
        track(&self.state, "update_sensor", self.clients.call(&request), |s, sensor: Sensor| {
            if let Some(entry) = s.sensors.iter_mut().find(|x| x.id == id) {
                *entry = sensor.clone();
            }
            if s.selected_sensor.as_ref().is_some_and(|x| x.id == id) {
                s.selected_sensor = Some(sensor.clone());
            }
            sensor
        })
        .await
    }

    pub async fn delete_sensor(&self, id: i64) -> bool {
        track(&self.state, "delete_sensor", self.clients.call(&DeleteSensor { id }), |s, _| {
            s.sensors.retain(|x| x.id != id);
            if s.selected_sensor.as_ref().is_some_and(|x| x.id == id) {
                s.selected_sensor = None;
            }
        })
        .await
        .is_some()
    }

    /// Selects a sensor already in the list; unknown ids clear the selection.
    pub fn select_sensor(&self, id: i64) -> Option<Sensor> {
        self.state.update(|s| {
            s.selected_sensor = s.sensors.iter().find(|x| x.id == id).cloned();
            s.selected_sensor.clone()
        })
    }

    pub fn sensors_for_hive(&self, hive_id: i64) -> Vec<Sensor> {
        self.state.with(|s| {
            s.sensors
                .iter()
                .filter(|x| x.hive_id == hive_id)
                .cloned()
                .collect()
        })
    }

    pub async fn fetch_sensor_stats(&self, sensor_id: i64) -> Option<SensorStats> {
        let request = GetSensorStats { sensor_id };
        track(&self.state, "fetch_sensor_stats", self.clients.call(&request), |_, stats| stats)
            .await
    }

    // ---------------------------------------------------------
    // Measurements
    // ---------------------------------------------------------

    pub async fn fetch_measurements(&self, sensor_id: i64, window: MeasurementWindow) {
        let request = ListMeasurements { sensor_id, window };
        track(&self.state, "fetch_measurements", self.clients.call(&request), |s, list| {
            s.measurements = list;
        })
        .await;
    }

    // ---------------------------------------------------------
    // Alerts
    // ---------------------------------------------------------

    /// Replaces the alert list. Alerts arrive unread.
    pub async fn fetch_alerts(&self, filter: AlertFilter) {
        let request = ListAlerts { filter };
        track(&self.state, "fetch_alerts", self.clients.call(&request), |s, alerts| {
            s.alerts = alerts;
        })
        .await;
    }

    pub async fn resolve_alert(&self, id: i64) -> bool {
        let request = ResolveAlert { id };
        track(&self.state, "resolve_alert", self.clients.call(&request), |s, _| {
            if let Some(alert) = s.alerts.iter_mut().find(|a| a.id == id) {
                alert.is_resolved = true;
            }
        })
        .await
        .is_some()
    }

    /// Local only; the monitoring service has no read flag.
    pub fn mark_alert_read(&self, id: i64) -> bool {
        let found = self.state.update(|s| match s.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.is_read = true;
                true
            }
            None => false,
        });
        debug!(alert_id = id, found, "marked alert read");
        found
    }

    pub fn alerts_for_hive(&self, hive_id: i64) -> Vec<Alert> {
        self.state.with(|s| {
            s.alerts
                .iter()
                .filter(|a| a.hive_id == hive_id)
                .cloned()
                .collect()
        })
    }

    pub fn unresolved_alerts(&self) -> Vec<Alert> {
        self.state.with(|s| s.alerts.iter().filter(|a| !a.is_resolved).cloned().collect())
    }
}
