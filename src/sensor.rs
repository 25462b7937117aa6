//! Maps push short keys to sensors and rate-limits their updates.
//!
//! A meter pushes every few seconds; consumers only want a value per sensor at
//! most once per throttle interval.

use crate::decode::Readings;
use crate::device::MacAddr;
use crate::listener::PushListener;
use crate::throttle::Throttle;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    PhaseVoltage,
    Current,
    Frequency,
    ActivePower,
    InductiveReactivePower,
    ApparentPower,
    PowerFactor,
    ActiveEnergy,
    InductiveReactiveEnergy,
}

impl SensorKind {
    fn from_push_prefix(prefix: char) -> Option<Self> {
        let kind = match prefix {
            'v' => SensorKind::PhaseVoltage,
            'i' => SensorKind::Current,
            'q' => SensorKind::Frequency,
            'a' => SensorKind::ActivePower,
            'r' => SensorKind::InductiveReactivePower,
            'p' => SensorKind::ApparentPower,
            'f' => SensorKind::PowerFactor,
            'e' => SensorKind::ActiveEnergy,
            'o' => SensorKind::InductiveReactiveEnergy,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            SensorKind::PhaseVoltage => "Phase Voltage",
            SensorKind::Current => "Current",
            SensorKind::Frequency => "Frequency",
            SensorKind::ActivePower => "Active Power",
            SensorKind::InductiveReactivePower => "Inductive Reactive Power",
            SensorKind::ApparentPower => "Apparent Power",
            SensorKind::PowerFactor => "Power Factor",
            SensorKind::ActiveEnergy => "Active Energy",
            SensorKind::InductiveReactiveEnergy => "Inductive Reactive Energy",
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            SensorKind::PhaseVoltage => Some("V"),
            SensorKind::Current => Some("A"),
            SensorKind::Frequency => Some("Hz"),
            SensorKind::ActivePower => Some("W"),
            SensorKind::InductiveReactivePower => Some("VArL"),
            SensorKind::ApparentPower => Some("VA"),
            SensorKind::PowerFactor => None,
            SensorKind::ActiveEnergy => Some("Wh"),
            SensorKind::InductiveReactiveEnergy => Some("VArLh"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    L1,
    L2,
    L3,
    Total,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::L1 => "L1",
            Phase::L2 => "L2",
            Phase::L3 => "L3",
            Phase::Total => "Total",
        };
        f.write_str(s)
    }
}

/// `v1` -> (PhaseVoltage, L1), `at` -> (ActivePower, Total); anything else is not a sensor.
pub fn classify(key: &str) -> Option<(SensorKind, Phase)> {
    let mut chars = key.chars();
    let (prefix, suffix) = (chars.next()?, chars.next()?);
    if chars.next().is_some() {
        return None;
    }

    let phase = match suffix {
        '1' => Phase::L1,
        '2' => Phase::L2,
        '3' => Phase::L3,
        't' => Phase::Total,
        _ => return None,
    };
    Some((SensorKind::from_push_prefix(prefix)?, phase))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorUpdate {
    pub mac: MacAddr,
    pub key: String,
    pub kind: SensorKind,
    pub phase: Phase,
    pub value: String,
}

/// Listener that turns a device's pushes into throttled sensor updates.
pub struct SensorHub {
    mac: MacAddr,
    throttle: Arc<Throttle>,
    tx: mpsc::UnboundedSender<SensorUpdate>,
}

impl SensorHub {
    pub fn new(mac: MacAddr, throttle: Arc<Throttle>, tx: mpsc::UnboundedSender<SensorUpdate>) -> Self {
        Self { mac, throttle, tx }
    }

    /// Publishes every sensor value in `readings` whose throttle window is open at `now`.
    /// Returns how many updates were sent.
    pub fn publish_at(&self, readings: &Readings, now: Instant) -> usize {
        let mut sent = 0;
        for (key, value) in readings {
            let Some((kind, phase)) = classify(key) else {
                continue;
            };

            let throttle_key = format!("{}/{}", self.mac, key);
            if !self.throttle.should_propagate_at(&throttle_key, now) {
                trace!(sensor = %throttle_key, "throttled sensor update");
                continue;
            }

            let update = SensorUpdate {
                mac: self.mac.clone(),
                key: key.clone(),
                kind,
                phase,
                value: value.clone(),
            };
            if self.tx.send(update).is_err() {
                warn!(mac = %self.mac, "sensor consumer has gone away");
                break;
            }
            sent += 1;
        }
        sent
    }
}

impl PushListener for SensorHub {
    fn deliver(&self, readings: &Readings) {
        self.publish_at(readings, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn readings(pairs: &[(&str, &str)]) -> Readings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn hub(throttle: Duration) -> (SensorHub, mpsc::UnboundedReceiver<SensorUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = SensorHub::new(
            MacAddr::parse("aabbccddeeff").unwrap(),
            Arc::new(Throttle::new(throttle)),
            tx,
        );
        (hub, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SensorUpdate>) -> Vec<String> {
        let mut values = Vec::new();
        while let Ok(update) = rx.try_recv() {
            values.push(update.value);
        }
        values
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("v1"), Some((SensorKind::PhaseVoltage, Phase::L1)));
        assert_eq!(classify("at"), Some((SensorKind::ActivePower, Phase::Total)));
        assert_eq!(classify("q3"), Some((SensorKind::Frequency, Phase::L3)));
        assert_eq!(classify("mac"), None);
        assert_eq!(classify("ip"), None);
        assert_eq!(classify("soft"), None);
        assert_eq!(classify("x1"), None);
        assert_eq!(classify("v"), None);
    }

    #[test]
    fn test_units() {
        assert_eq!(SensorKind::PhaseVoltage.unit(), Some("V"));
        assert_eq!(SensorKind::PowerFactor.unit(), None);
        assert_eq!(SensorKind::InductiveReactiveEnergy.name(), "Inductive Reactive Energy");
    }

    #[test]
    fn test_hub_ignores_non_sensor_keys() {
        let (hub, mut rx) = hub(Duration::ZERO);
        let sent = hub.publish_at(
            &readings(&[("mac", "aabbccddeeff"), ("ip", "10.0.0.2"), ("v1", "242.75")]),
            Instant::now(),
        );

        assert_eq!(sent, 1);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.key, "v1");
        assert_eq!(update.kind, SensorKind::PhaseVoltage);
        assert_eq!(update.phase, Phase::L1);
        assert_eq!(update.value, "242.75");
    }

    #[test]
    fn test_hub_throttles_each_sensor() {
        let (hub, mut rx) = hub(Duration::from_secs(2));
        let t0 = Instant::now();

        hub.publish_at(&readings(&[("v1", "235")]), t0);
        hub.publish_at(&readings(&[("v1", "240")]), t0 + Duration::from_millis(500));
        hub.publish_at(&readings(&[("v1", "245")]), t0 + Duration::from_millis(1500));
        hub.publish_at(&readings(&[("v1", "250")]), t0 + Duration::from_millis(2100));

        assert_eq!(drain(&mut rx), vec!["235", "250"]);
    }

    #[test]
    fn test_hub_throttle_does_not_couple_sensors() {
        let (hub, mut rx) = hub(Duration::from_secs(2));
        let t0 = Instant::now();

        hub.publish_at(&readings(&[("v1", "235")]), t0);
        hub.publish_at(&readings(&[("v1", "240"), ("i1", "3.59")]), t0 + Duration::from_millis(100));

        assert_eq!(drain(&mut rx), vec!["235", "3.59"]);
    }

    #[test]
    fn test_hub_without_throttle_passes_everything() {
        let (hub, mut rx) = hub(Duration::ZERO);
        let t0 = Instant::now();

        for v in ["235", "240", "245"] {
            hub.publish_at(&readings(&[("v1", v)]), t0);
        }

        assert_eq!(drain(&mut rx), vec!["235", "240", "245"]);
    }
}
