//! Snapshot — the immutable, timestamped projection of one vessel that
//! crosses the core boundary.
//!
//! On the wire a snapshot is a flat JSON record (`WireRecord`): the same
//! shape the recorded logs use, with friendly-only fields omitted for
//! adversaries. Reading a record back applies safe defaults for anything
//! a recorded log left out.

use crate::{
    error::SimError,
    geo::{self, Coordinate},
    types::VesselId,
    vessel::{Faction, Status},
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Below this speed a record without a status is taken to be idle.
pub const MOVING_THRESHOLD_KN: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireRecord", try_from = "WireRecord")]
pub struct Snapshot {
    pub timestamp:   DateTime<Utc>,
    pub vessel_id:   VesselId,
    pub position:    Coordinate,
    pub speed_kn:    f64,
    pub heading_deg: f64,
    pub detail:      SnapshotDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotDetail {
    Friendly {
        battery_pct:   f64,
        status:        Status,
        error_details: String,
        target_id:     Option<VesselId>,
    },
    Adversary,
}

impl Snapshot {
    pub fn faction(&self) -> Faction {
        match self.detail {
            SnapshotDetail::Friendly { .. } => Faction::Friendly,
            SnapshotDetail::Adversary       => Faction::Adversary,
        }
    }

    pub fn status(&self) -> Option<Status> {
        match &self.detail {
            SnapshotDetail::Friendly { status, .. } => Some(*status),
            SnapshotDetail::Adversary => None,
        }
    }

    pub fn battery_pct(&self) -> Option<f64> {
        match &self.detail {
            SnapshotDetail::Friendly { battery_pct, .. } => Some(*battery_pct),
            SnapshotDetail::Adversary => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match &self.detail {
            SnapshotDetail::Friendly { target_id, .. } => target_id.as_deref(),
            SnapshotDetail::Adversary => None,
        }
    }
}

/// Vessel ids arrive as integers in older logs and strings in newer ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Int(i64),
    Str(String),
}

impl WireId {
    fn into_id(self) -> VesselId {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s,
        }
    }
}

/// Flat record shape shared by recorded logs and the query interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub timestamp: String,
    pub boat_id:   WireId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind:      Option<String>,
    pub lat:       f64,
    pub lon:       f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_knots: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_deg:  Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery:     Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status:      Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id:   Option<WireId>,
}

impl From<Snapshot> for WireRecord {
    fn from(s: Snapshot) -> Self {
        let kind = Some(s.faction().wire_tag().to_string());
        let mut record = WireRecord {
            timestamp:     s.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            boat_id:       WireId::Str(s.vessel_id),
            kind,
            lat:           s.position.lat,
            lon:           s.position.lon,
            speed_knots:   Some(s.speed_kn),
            course_deg:    Some(s.heading_deg),
            battery:       None,
            status:        None,
            error_details: None,
            target_id:     None,
        };
        if let SnapshotDetail::Friendly { battery_pct, status, error_details, target_id } = s.detail {
            record.battery = Some(battery_pct);
            record.status = Some(status.as_str().to_string());
            record.error_details = Some(error_details);
            record.target_id = target_id.map(WireId::Str);
        }
        record
    }
}

impl TryFrom<WireRecord> for Snapshot {
    type Error = SimError;

    fn try_from(r: WireRecord) -> Result<Self, Self::Error> {
        let invalid = |reason: String| SimError::InvalidLogFormat { line: 0, reason };

        let timestamp = parse_timestamp(&r.timestamp)
            .ok_or_else(|| invalid(format!("unparseable timestamp '{}'", r.timestamp)))?;
        if !r.lat.is_finite() || !r.lon.is_finite() {
            return Err(invalid("non-finite position".into()));
        }
        let faction = match r.kind.as_deref() {
            None => Faction::Friendly,
            Some(tag) => Faction::from_wire(tag)
                .ok_or_else(|| invalid(format!("unknown vessel type '{tag}'")))?,
        };

        let speed_kn = r.speed_knots.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0);
        let heading_deg = geo::normalize_heading(r.course_deg.filter(|v| v.is_finite()).unwrap_or(0.0));

        let detail = match faction {
            Faction::Adversary => SnapshotDetail::Adversary,
            Faction::Friendly => {
                let status = r
                    .status
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| Status::from_wire(s).ok_or_else(|| invalid(format!("unknown status '{s}'"))))
                    .transpose()?
                    .unwrap_or(if speed_kn > MOVING_THRESHOLD_KN { Status::Tracking } else { Status::Idle });
                SnapshotDetail::Friendly {
                    battery_pct:   r.battery.filter(|v| v.is_finite()).unwrap_or(100.0).clamp(0.0, 100.0),
                    status,
                    error_details: r.error_details.unwrap_or_default(),
                    target_id:     r.target_id.map(WireId::into_id),
                }
            }
        };

        Ok(Snapshot {
            timestamp,
            vessel_id: r.boat_id.into_id(),
            position: Coordinate::new(r.lat, r.lon),
            speed_kn,
            heading_deg,
            detail,
        })
    }
}

/// RFC 3339, or naive ISO-8601 taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|t| t.and_utc())
}
