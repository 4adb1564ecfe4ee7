//! OBD-II PID Definitions and Physical Decoders
//!
//! Defines the Mode 01 parameters the logger understands and the formulas
//! turning their payload bytes into engineering units. Every decoder returns
//! `None` when the payload is shorter than its formula needs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mode 01 PIDs with a physical decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pid {
    /// Fuel system status (0x03)
    FuelSystemStatus = 0x03,
    /// Calculated engine load (0x04)
    EngineLoad = 0x04,
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Short-term fuel trim bank 1 (0x06)
    ShortFuelTrim = 0x06,
    /// Intake manifold absolute pressure (0x0B)
    IntakeManifoldPressure = 0x0B,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Timing advance (0x0E)
    TimingAdvance = 0x0E,
    /// Intake air temperature (0x0F)
    IntakeAirTemp = 0x0F,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
    /// Oxygen sensor bank 1, sensor 2 (0x15)
    O2SensorB1S2 = 0x15,
    /// Relative throttle position (0x45)
    RelativeThrottle = 0x45,
    /// Ambient air temperature (0x47)
    AmbientTemp = 0x47,
    /// Commanded throttle actuator (0x4C)
    CommandedThrottle = 0x4C,
}

impl Pid {
    /// Every decodable PID in ascending order
    pub const ALL: [Pid; 15] = [
        Pid::FuelSystemStatus,
        Pid::EngineLoad,
        Pid::CoolantTemp,
        Pid::ShortFuelTrim,
        Pid::IntakeManifoldPressure,
        Pid::Rpm,
        Pid::Speed,
        Pid::TimingAdvance,
        Pid::IntakeAirTemp,
        Pid::Maf,
        Pid::ThrottlePosition,
        Pid::O2SensorB1S2,
        Pid::RelativeThrottle,
        Pid::AmbientTemp,
        Pid::CommandedThrottle,
    ];

    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Look up a PID by its code
    pub fn from_hex(code: u8) -> Option<Pid> {
        Self::ALL.iter().copied().find(|p| p.as_hex() == code)
    }

    /// Minimum payload bytes the decoder needs
    pub fn response_bytes(&self) -> usize {
        match self {
            Pid::Rpm | Pid::Maf | Pid::O2SensorB1S2 => 2,
            _ => 1,
        }
    }

    /// Human-readable label with unit
    pub fn label(&self) -> &'static str {
        match self {
            Pid::FuelSystemStatus => "Fuel System",
            Pid::EngineLoad => "Load %",
            Pid::CoolantTemp => "Coolant °C",
            Pid::ShortFuelTrim => "STFT %",
            Pid::IntakeManifoldPressure => "MAP kPa",
            Pid::Rpm => "RPM",
            Pid::Speed => "Speed km/h",
            Pid::TimingAdvance => "Timing °",
            Pid::IntakeAirTemp => "IAT °C",
            Pid::Maf => "MAF g/s",
            Pid::ThrottlePosition => "Throttle %",
            Pid::O2SensorB1S2 => "O2 B1S2",
            Pid::RelativeThrottle => "Rel Throttle %",
            Pid::AmbientTemp => "Ambient °C",
            Pid::CommandedThrottle => "Cmd Throttle %",
        }
    }

    /// CSV column name
    pub fn column(&self) -> &'static str {
        match self {
            Pid::FuelSystemStatus => "fuel_system_status",
            Pid::EngineLoad => "load_pct",
            Pid::CoolantTemp => "coolant_c",
            Pid::ShortFuelTrim => "stft_b1_pct",
            Pid::IntakeManifoldPressure => "map_kpa",
            Pid::Rpm => "rpm",
            Pid::Speed => "speed_kmh",
            Pid::TimingAdvance => "timing_deg",
            Pid::IntakeAirTemp => "iat_c",
            Pid::Maf => "maf_gps",
            Pid::ThrottlePosition => "throttle_pct",
            Pid::O2SensorB1S2 => "o2_b1s2_v_or_stft",
            Pid::RelativeThrottle => "rel_throttle_pct",
            Pid::AmbientTemp => "ambient_c",
            Pid::CommandedThrottle => "cmd_throttle_pct",
        }
    }

    /// Fixed decimal places used when rendering values
    pub fn precision(&self) -> usize {
        match self {
            Pid::EngineLoad | Pid::ShortFuelTrim | Pid::Maf => 2,
            Pid::TimingAdvance
            | Pid::ThrottlePosition
            | Pid::RelativeThrottle
            | Pid::CommandedThrottle => 1,
            _ => 0,
        }
    }

    /// Decode a payload into a physical value
    pub fn decode(&self, bytes: &[u8]) -> Option<PidValue> {
        match self {
            Pid::FuelSystemStatus => decode::fuel_system_status(bytes).map(PidValue::Text),
            Pid::EngineLoad => decode::percent(bytes).map(PidValue::Number),
            Pid::CoolantTemp | Pid::IntakeAirTemp | Pid::AmbientTemp => {
                decode::temperature(bytes).map(PidValue::Number)
            }
            Pid::ShortFuelTrim => decode::fuel_trim(bytes).map(PidValue::Number),
            Pid::IntakeManifoldPressure | Pid::Speed => decode::raw(bytes).map(PidValue::Number),
            Pid::Rpm => decode::rpm(bytes).map(PidValue::Number),
            Pid::TimingAdvance => decode::timing_advance(bytes).map(PidValue::Number),
            Pid::Maf => decode::maf(bytes).map(PidValue::Number),
            Pid::ThrottlePosition | Pid::RelativeThrottle | Pid::CommandedThrottle => {
                decode::percent(bytes).map(PidValue::Number)
            }
            Pid::O2SensorB1S2 => {
                decode::o2_sensor(bytes).map(|(voltage, trim)| PidValue::O2 { voltage, trim })
            }
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} ({})", self.as_hex(), self.label())
    }
}

/// Column name for any PID code, decodable or not
pub fn column_for(code: u8) -> String {
    Pid::from_hex(code)
        .map(|p| p.column().to_string())
        .unwrap_or_else(|| format!("pid_{code:02X}"))
}

/// Formulas for Mode 01 payloads
pub mod decode {
    /// Fuel system status as text; unknown codes render as a hex literal
    pub fn fuel_system_status(bytes: &[u8]) -> Option<String> {
        let a = *bytes.first()?;
        let text = match a {
            0x01 => "Open loop".to_string(),
            0x02 => "Closed loop".to_string(),
            0x04 => "Open loop (engine load)".to_string(),
            0x08 => "Open loop (system fault)".to_string(),
            0x10 => "Closed loop (O2/sensors)".to_string(),
            other => format!("0x{other:02X}"),
        };
        Some(text)
    }

    /// A * 100 / 255 (%)
    pub fn percent(bytes: &[u8]) -> Option<f64> {
        bytes.first().map(|&a| a as f64 * 100.0 / 255.0)
    }

    /// A - 40 (°C)
    pub fn temperature(bytes: &[u8]) -> Option<f64> {
        bytes.first().map(|&a| a as f64 - 40.0)
    }

    /// (A - 128) / 1.28 (%)
    pub fn fuel_trim(bytes: &[u8]) -> Option<f64> {
        bytes.first().map(|&a| (a as f64 - 128.0) / 1.28)
    }

    /// A, unscaled (kPa, km/h)
    pub fn raw(bytes: &[u8]) -> Option<f64> {
        bytes.first().map(|&a| a as f64)
    }

    /// ((A * 256) + B) / 4 (rpm)
    pub fn rpm(bytes: &[u8]) -> Option<f64> {
        word(bytes).map(|w| w / 4.0)
    }

    /// A / 2 - 64 (degrees before TDC)
    pub fn timing_advance(bytes: &[u8]) -> Option<f64> {
        bytes.first().map(|&a| a as f64 / 2.0 - 64.0)
    }

    /// ((A * 256) + B) / 100 (g/s)
    pub fn maf(bytes: &[u8]) -> Option<f64> {
        word(bytes).map(|w| w / 100.0)
    }

    /// (A / 200 V, (B - 128) / 1.28 %)
    pub fn o2_sensor(bytes: &[u8]) -> Option<(f64, f64)> {
        match bytes {
            [a, b, ..] => Some((*a as f64 / 200.0, (*b as f64 - 128.0) / 1.28)),
            _ => None,
        }
    }

    fn word(bytes: &[u8]) -> Option<f64> {
        match bytes {
            [a, b, ..] => Some(*a as f64 * 256.0 + *b as f64),
            _ => None,
        }
    }
}

/// A decoded physical value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PidValue {
    Number(f64),
    Text(String),
    /// Sensor voltage (V) and its associated fuel trim (%)
    O2 { voltage: f64, trim: f64 },
}

impl PidValue {
    /// Numeric reading, if this value has one (O2 yields its voltage)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PidValue::Number(v) => Some(*v),
            PidValue::O2 { voltage, .. } => Some(*voltage),
            PidValue::Text(_) => None,
        }
    }

    /// Render for a CSV cell with `precision` decimals
    pub fn to_cell(&self, precision: usize) -> String {
        match self {
            PidValue::Number(v) => format!("{v:.precision$}"),
            PidValue::Text(t) => t.clone(),
            PidValue::O2 { voltage, trim } => format!("{voltage:.3}/{trim:.2}"),
        }
    }

    /// Render for the live display with `precision` decimals
    pub fn to_display(&self, precision: usize) -> String {
        match self {
            PidValue::O2 { voltage, trim } => format!("{voltage:.3} V, {trim:.2} %"),
            other => other.to_cell(precision),
        }
    }
}

/// One polling cycle's readings; `None` means unavailable this cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedSample {
    /// Timestamp (Unix ms)
    pub timestamp_ms: u64,
    /// Reading per requested PID
    pub values: BTreeMap<Pid, Option<PidValue>>,
}

impl DecodedSample {
    /// Create a new empty sample with the given timestamp
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, pid: Pid, value: Option<PidValue>) {
        self.values.insert(pid, value);
    }

    pub fn get(&self, pid: Pid) -> Option<&PidValue> {
        self.values.get(&pid).and_then(Option::as_ref)
    }

    /// Numeric reading for `pid`, if requested and available
    pub fn number(&self, pid: Pid) -> Option<f64> {
        self.get(pid).and_then(PidValue::as_f64)
    }

    /// CSV cell for `pid`; empty when unavailable
    pub fn cell(&self, pid: Pid) -> String {
        self.get(pid)
            .map(|v| v.to_cell(pid.precision()))
            .unwrap_or_default()
    }
}
