//! Source expansion stages: lookup joins and per-record fan-out.

use crate::page::QueryParam;
use crate::{FieldPath, SourceRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default wall-clock limit for one fan-out request, in seconds.
pub const DEFAULT_FAN_OUT_TIMEOUT_SECS: u64 = 15;

/// Attach fields from a second endpoint onto each source record.
///
/// The lookup set is fetched once per run and indexed by `remote_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupJoin {
    /// Paginated endpoint providing the lookup records
    pub endpoint: String,
    #[serde(default)]
    pub query: Vec<QueryParam>,
    /// Field on the source record holding the join key
    pub local_key: FieldPath,
    /// Field on the lookup record holding the join key
    pub remote_key: FieldPath,
    /// Prefix under which attached fields are placed
    pub attach_as: String,
    /// Lookup fields copied onto the source record
    pub fields: Vec<FieldPath>,
}

/// An indexed lookup set.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    by_key: HashMap<String, SourceRecord>,
}

impl LookupTable {
    /// Index lookup records by the join's remote key. Later duplicates win.
    pub fn build(join: &LookupJoin, records: Vec<SourceRecord>) -> Self {
        let by_key = records
            .into_iter()
            .filter_map(|record| record.text(&join.remote_key).map(|key| (key, record)))
            .collect();
        Self { by_key }
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Copy the joined fields onto `record`. Returns whether a match was found.
    pub fn enrich(&self, join: &LookupJoin, record: &mut SourceRecord) -> bool {
        let Some(found) = record
            .text(&join.local_key)
            .and_then(|key| self.by_key.get(&key))
        else {
            return false;
        };

        for field in &join.fields {
            if let Some(value) = found.get(field) {
                record.set(&format!("{}.{}", join.attach_as, field), value.clone());
            }
        }
        true
    }
}

/// Replace each parent record with the records of a per-parent endpoint.
///
/// Used for per-listing calendars: one request per listing, all issued
/// together. Each child gets the selected parent fields attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOut {
    /// Endpoint template; `{id}` is replaced by the parent key
    pub endpoint: String,
    /// Field on the parent record substituted into the endpoint
    pub parent_key: FieldPath,
    #[serde(default)]
    pub query: Vec<QueryParam>,
    /// Parent fields copied onto each child
    #[serde(default)]
    pub carry: Vec<FieldPath>,
    /// Prefix under which carried fields are placed
    pub attach_as: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_FAN_OUT_TIMEOUT_SECS
}

impl FanOut {
    /// Endpoint for one parent, or `None` when the parent has no key.
    pub fn endpoint_for(&self, parent: &SourceRecord) -> Option<String> {
        let key = parent.text(&self.parent_key).filter(|k| !k.is_empty())?;
        Some(self.endpoint.replace("{id}", &key))
    }

    /// Turn raw child values into records carrying the parent fields.
    pub fn attach(&self, parent: &SourceRecord, children: Vec<Value>) -> Vec<SourceRecord> {
        children
            .into_iter()
            .map(|child| {
                let mut child = SourceRecord::new(child);
                for field in &self.carry {
                    if let Some(value) = parent.get(field) {
                        child.set(&format!("{}.{}", self.attach_as, field), value.clone());
                    }
                }
                child
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing_join() -> LookupJoin {
        LookupJoin {
            endpoint: "/v1/listings".into(),
            query: vec![],
            local_key: "listingMapId".into(),
            remote_key: "id".into(),
            attach_as: "listing".into(),
            fields: vec!["countryCode".into(), "name".into()],
        }
    }

    fn listings() -> Vec<SourceRecord> {
        vec![
            SourceRecord::new(json!({"id": 1, "countryCode": "AE", "name": "Marina"})),
            SourceRecord::new(json!({"id": 2, "countryCode": "GB"})),
            SourceRecord::new(json!({"name": "no id"})),
        ]
    }

    #[test]
    fn lookup_enriches_matching_records() {
        let join = listing_join();
        let table = LookupTable::build(&join, listings());
        assert_eq!(table.len(), 2);

        let mut charge = SourceRecord::new(json!({"id": 10, "listingMapId": 1}));
        assert!(table.enrich(&join, &mut charge));
        assert_eq!(charge.text("listing.countryCode").as_deref(), Some("AE"));
        assert_eq!(charge.text("listing.name").as_deref(), Some("Marina"));

        let mut partial = SourceRecord::new(json!({"id": 11, "listingMapId": "2"}));
        assert!(table.enrich(&join, &mut partial));
        assert_eq!(partial.text("listing.countryCode").as_deref(), Some("GB"));
        assert_eq!(partial.get("listing.name"), None);
    }

    #[test]
    fn lookup_miss_leaves_record_untouched() {
        let join = listing_join();
        let table = LookupTable::build(&join, listings());

        let mut orphan = SourceRecord::new(json!({"id": 12, "listingMapId": 99}));
        assert!(!table.enrich(&join, &mut orphan));
        assert_eq!(orphan.as_value(), &json!({"id": 12, "listingMapId": 99}));
    }

    #[test]
    fn fan_out_endpoint_and_attach() {
        let fan_out = FanOut {
            endpoint: "/v1/listings/{id}/calendar".into(),
            parent_key: "id".into(),
            query: vec![],
            carry: vec!["id".into(), "name".into()],
            attach_as: "listing".into(),
            timeout_secs: DEFAULT_FAN_OUT_TIMEOUT_SECS,
        };
        let parent = SourceRecord::new(json!({"id": 7, "name": "Creek"}));

        assert_eq!(
            fan_out.endpoint_for(&parent).as_deref(),
            Some("/v1/listings/7/calendar")
        );
        assert_eq!(fan_out.endpoint_for(&SourceRecord::new(json!({}))), None);

        let children = fan_out.attach(
            &parent,
            vec![json!({"date": "2026-10-19", "isAvailable": 1})],
        );
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].text("listing.id").as_deref(), Some("7"));
        assert_eq!(children[0].text("listing.name").as_deref(), Some("Creek"));
        assert_eq!(children[0].text("date").as_deref(), Some("2026-10-19"));
    }

    #[test]
    fn fan_out_timeout_defaults() {
        let fan_out: FanOut = serde_json::from_value(json!({
            "endpoint": "/v1/listings/{id}/calendar",
            "parentKey": "id",
            "attachAs": "listing"
        }))
        .unwrap();
        assert_eq!(fan_out.timeout_secs, DEFAULT_FAN_OUT_TIMEOUT_SECS);
        assert!(fan_out.carry.is_empty());
    }
}
