use super::{LoadState, Tracked, track};
use crate::client::ApiClientSet;
use crate::state::{Observable, SubscriptionId};
use apiary_shared::protocol::{
    CreateHive, CreateInspection, DeleteHive, GetHive, ListHives, ListInspections, UpdateHive,
};
use apiary_shared::{Hive, HiveChanges, HiveDraft, Inspection, InspectionDraft};
use std::rc::Rc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HiveState {
    pub hives: Vec<Hive>,
    pub selected: Option<Hive>,
    pub inspections: Vec<Inspection>,
    pub status: LoadState,
}

impl Tracked for HiveState {
    fn load_state(&mut self) -> &mut LoadState {
        &mut self.status
    }
}

pub struct HiveStore {
    state: Observable<HiveState>,
    clients: Rc<ApiClientSet>,
}

impl HiveStore {
    pub fn new(clients: Rc<ApiClientSet>) -> Self {
        Self {
            state: Observable::default(),
            clients,
        }
    }

    pub fn snapshot(&self) -> HiveState {
        self.state.get()
    }

    pub fn subscribe(&self, subscriber: impl Fn(&HiveState) + 'static) -> SubscriptionId {
        self.state.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    pub async fn fetch_hives(&self) {
        track(&self.state, "fetch_hives", self.clients.call(&ListHives), |s, hives| {
            s.hives = hives;
        })
        .await;
    }

    /// Loads one hive and makes it the selection.
    pub async fn fetch_hive(&self, id: i64) -> Option<Hive> {
        track(&self.state, "fetch_hive", self.clients.call(&GetHive { id }), |s, hive: Hive| {
            s.selected = Some(hive.clone());
            hive
        })
        .await
    }

    pub async fn create_hive(&self, draft: HiveDraft) -> Option<Hive> {
        let request = CreateHive(draft);
        track(&self.state, "create_hive", self.clients.call(&request), |s, hive: Hive| {
            s.hives.push(hive.clone());
            hive
        })
        .await
    }

    pub async fn update_hive(&self, id: i64, changes: HiveChanges) -> Option<Hive> {
        let request = UpdateHive { id, changes };
        track(&self.state, "update_hive", self.clients.call(&request), |s, hive: Hive| {
            if let Some(entry) = s.hives.iter_mut().find(|h| h.id == id) {
                *entry = hive.clone();
            }
            if s.selected.as_ref().is_some_and(|h| h.id == id) {
                s.selected = Some(hive.clone());
            }
            hive
        })
        .await
    }

    pub async fn delete_hive(&self, id: i64) -> bool {
        track(&self.state, "delete_hive", self.clients.call(&DeleteHive { id }), |s, _| {
            s.hives.retain(|h| h.id != id);
            if s.selected.as_ref().is_some_and(|h| h.id == id) {
                s.selected = None;
            }
        })
        .await
        .is_some()
    }

    /// Replaces the inspection list with the hive's inspections.
    pub async fn fetch_inspections(&self, hive_id: i64) -> Vec<Inspection> {
        let request = ListInspections { hive_id };
        track(&self.state, "fetch_inspections", self.clients.call(&request), |s, list: Vec<Inspection>| {
            s.inspections = list;
            s.inspections.clone()
        })
        .await
        .unwrap_or_default()
    }

    pub async fn create_inspection(&self, draft: InspectionDraft) -> Option<Inspection> {
        let request = CreateInspection(draft);
        track(&self.state, "create_inspection", self.clients.call(&request), |s, inspection: Inspection| {
            s.inspections.push(inspection.clone());
            inspection
        })
        .await
    }
}
