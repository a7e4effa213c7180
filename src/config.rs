//! Configuration for the link, the poller, the simulator and port discovery.
//!
//! Every section has sensible defaults and `with_*` builders. With the
//! `serde` feature, the whole tree loads from JSON; missing fields keep their
//! defaults.
//!
//! # Example
//!
//! ```rust
//! use safety_io_tester::config::{Config, LinkConfig, SimulatorConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.link.baud_rate, 115_200);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_link(LinkConfig::default().with_port("/dev/ttyACM0").with_read_timeout_ms(500))
//!     .with_simulator(SimulatorConfig::default().with_seed(7));
//! assert_eq!(config.link.port.as_str(), "/dev/ttyACM0");
//! ```

use core::ops::RangeInclusive;
use core::time::Duration;

use heapless::String as HString;

use crate::commands::MAX_HEARTBEAT_HZ;
use crate::pins::PinBank;

/// Maximum length for config strings (port names, device names)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum number of USB vendor IDs in the port filter
pub const MAX_VENDOR_IDS: usize = 8;

/// Type alias for config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// USB vendor IDs of the controller boards (Arduino, Arduino SRL, SparkFun, Adafruit)
pub const DEFAULT_VENDOR_IDS: [u16; 4] = [0x2341, 0x2A03, 0x1B4F, 0x239A];

/// Create a ShortString from a &str, truncating at a character boundary if too long
pub fn short_string(s: &str) -> ShortString {
    let mut end = s.len().min(MAX_SHORT_STRING);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut hs = ShortString::new();
    let _ = hs.push_str(&s[..end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Serial link and timeouts
    pub link: LinkConfig,
    /// Status polling
    pub poll: PollConfig,
    /// In-process simulator
    pub simulator: SimulatorConfig,
    /// Port discovery
    pub device: DeviceConfig,
}

impl Config {
    /// Set link configuration
    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }

    /// Set poll configuration
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Set simulator configuration
    pub fn with_simulator(mut self, simulator: SimulatorConfig) -> Self {
        self.simulator = simulator;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Parse a configuration from JSON.
    ///
    /// ```rust
    /// use safety_io_tester::config::Config;
    ///
    /// let config = Config::from_json(r#"{"link": {"read_timeout_ms": 250}}"#).unwrap();
    /// assert_eq!(config.link.read_timeout_ms, 250);
    /// assert_eq!(config.link.baud_rate, 115_200);
    /// ```
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to pretty JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Link Config
// ============================================================================

/// Serial link configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Port to open; empty picks the first candidate port
    pub port: ShortString,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-frame read timeout in milliseconds
    pub read_timeout_ms: u32,
    /// Write timeout in milliseconds
    pub write_timeout_ms: u32,
    /// Time the controller needs to measure a heartbeat, added to the read timeout
    pub heartbeat_settle_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: ShortString::new(),
            baud_rate: 115_200,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            heartbeat_settle_ms: 1000,
        }
    }
}

impl LinkConfig {
    /// Set the port
    pub fn with_port(mut self, port: &str) -> Self {
        self.port = short_string(port);
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout_ms(mut self, ms: u32) -> Self {
        self.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout_ms(mut self, ms: u32) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Set the heartbeat settle time
    pub fn with_heartbeat_settle_ms(mut self, ms: u32) -> Self {
        self.heartbeat_settle_ms = ms;
        self
    }

    /// Read timeout for ordinary responses
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.read_timeout_ms))
    }

    /// Write timeout
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.write_timeout_ms))
    }

    /// Read timeout for heartbeat responses
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.read_timeout_ms) + u64::from(self.heartbeat_settle_ms))
    }

    /// Configured port, if any
    pub fn port(&self) -> Option<&str> {
        (!self.port.is_empty()).then_some(self.port.as_str())
    }
}

// ============================================================================
// Poll Config
// ============================================================================

/// Status polling configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PollConfig {
    /// Poll interval in milliseconds
    pub interval_ms: u32,
    /// Stop polling after the driver disconnects
    pub stop_on_disconnect: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            stop_on_disconnect: true,
        }
    }
}

impl PollConfig {
    /// Set the poll interval (minimum 1 ms)
    pub fn with_interval_ms(mut self, ms: u32) -> Self {
        self.interval_ms = ms.max(1);
        self
    }

    /// Set whether polling stops on disconnect
    pub fn with_stop_on_disconnect(mut self, stop: bool) -> Self {
        self.stop_on_disconnect = stop;
        self
    }

    /// Poll interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.interval_ms.max(1)))
    }
}

// ============================================================================
// Simulator Config
// ============================================================================

/// In-process controller simulator configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulatorConfig {
    /// Pins at power-on
    pub initial_pins: PinBank,
    /// Lowest reported heartbeat in Hz
    pub heartbeat_min_hz: u32,
    /// Highest reported heartbeat in Hz
    pub heartbeat_max_hz: u32,
    /// Randomize the heartbeat indicator pins on every heartbeat read
    pub indicator_jitter: bool,
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Reject every connection attempt
    pub refuse_connections: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_pins: PinBank::factory_default(),
            heartbeat_min_hz: 5,
            heartbeat_max_hz: 15,
            indicator_jitter: true,
            seed: None,
            refuse_connections: false,
        }
    }
}

impl SimulatorConfig {
    /// Set the power-on pins
    pub fn with_initial_pins(mut self, pins: PinBank) -> Self {
        self.initial_pins = pins;
        self
    }

    /// Set the heartbeat range (order-insensitive, clamped to five digits)
    pub fn with_heartbeat_range(mut self, min_hz: u32, max_hz: u32) -> Self {
        self.heartbeat_min_hz = min_hz.min(max_hz).min(MAX_HEARTBEAT_HZ);
        self.heartbeat_max_hz = max_hz.max(min_hz).min(MAX_HEARTBEAT_HZ);
        self
    }

    /// Enable or disable indicator jitter
    pub fn with_indicator_jitter(mut self, jitter: bool) -> Self {
        self.indicator_jitter = jitter;
        self
    }

    /// Set a fixed RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject or accept connections
    pub fn with_refuse_connections(mut self, refuse: bool) -> Self {
        self.refuse_connections = refuse;
        self
    }

    /// Normalized heartbeat range
    pub fn heartbeat_range(&self) -> RangeInclusive<u32> {
        let lo = self.heartbeat_min_hz.min(self.heartbeat_max_hz).min(MAX_HEARTBEAT_HZ);
        let hi = self.heartbeat_max_hz.max(self.heartbeat_min_hz).min(MAX_HEARTBEAT_HZ);
        lo..=hi
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Port discovery configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Human-readable name for logs
    pub name: ShortString,
    /// USB vendor IDs accepted as controller boards; empty accepts every port
    pub vendor_ids: heapless::Vec<u16, MAX_VENDOR_IDS>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut vendor_ids = heapless::Vec::new();
        for vid in DEFAULT_VENDOR_IDS {
            let _ = vendor_ids.push(vid);
        }
        Self {
            name: short_string("safety-io"),
            vendor_ids,
        }
    }
}

impl DeviceConfig {
    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Replace the vendor filter (extra IDs beyond capacity are ignored)
    pub fn with_vendor_ids(mut self, ids: &[u16]) -> Self {
        self.vendor_ids.clear();
        for vid in ids.iter().take(MAX_VENDOR_IDS) {
            let _ = self.vendor_ids.push(*vid);
        }
        self
    }

    /// Whether a USB vendor ID passes the filter
    pub fn accepts_vendor(&self, vid: u16) -> bool {
        self.vendor_ids.is_empty() || self.vendor_ids.contains(&vid)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.link.baud_rate, 115_200);
        assert_eq!(config.link.read_timeout_ms, 1000);
        assert_eq!(config.poll.interval_ms, 100);
        assert_eq!(config.simulator.heartbeat_range(), 5..=15);
        assert_eq!(config.device.vendor_ids.as_slice(), &DEFAULT_VENDOR_IDS);
    }

    #[test]
    fn heartbeat_timeout_includes_settle_time() {
        let link = LinkConfig::default()
            .with_read_timeout_ms(200)
            .with_heartbeat_settle_ms(800);
        assert_eq!(link.read_timeout(), Duration::from_millis(200));
        assert_eq!(link.heartbeat_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn empty_port_means_auto() {
        assert_eq!(LinkConfig::default().port(), None);
        assert_eq!(LinkConfig::default().with_port("COM4").port(), Some("COM4"));
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        assert_eq!(short_string(&long_input).len(), MAX_SHORT_STRING);

        // Multi-byte character straddling the limit is dropped whole
        let mixed = format!("{}é", "a".repeat(MAX_SHORT_STRING - 1));
        let s = short_string(&mixed);
        assert_eq!(s.len(), MAX_SHORT_STRING - 1);
    }

    #[test]
    fn heartbeat_range_normalized() {
        let sim = SimulatorConfig::default().with_heartbeat_range(20, 3);
        assert_eq!(sim.heartbeat_range(), 3..=20);

        let sim = SimulatorConfig::default().with_heartbeat_range(0, 1_000_000);
        assert_eq!(sim.heartbeat_range(), 0..=MAX_HEARTBEAT_HZ);
    }

    #[test]
    fn poll_interval_has_floor() {
        assert_eq!(PollConfig::default().with_interval_ms(0).interval_ms, 1);
    }

    #[test]
    fn vendor_filter() {
        let device = DeviceConfig::default();
        assert!(device.accepts_vendor(0x2341));
        assert!(!device.accepts_vendor(0x303A));

        let open = DeviceConfig::default().with_vendor_ids(&[]);
        assert!(open.accepts_vendor(0x303A));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_link(LinkConfig::default().with_port("/dev/ttyUSB1").with_baud_rate(9600))
            .with_poll(PollConfig::default().with_interval_ms(250))
            .with_device(DeviceConfig::default().with_name("bench rig"));

        assert_eq!(config.link.port.as_str(), "/dev/ttyUSB1");
        assert_eq!(config.link.baud_rate, 9600);
        assert_eq!(config.poll.interval(), Duration::from_millis(250));
        assert_eq!(config.device.name.as_str(), "bench rig");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_roundtrip_keeps_defaults() {
        let config = Config::from_json(
            r#"{"simulator": {"seed": 42, "heartbeat_max_hz": 30}, "device": {"vendor_ids": [1027]}}"#,
        )
        .unwrap();
        assert_eq!(config.simulator.seed, Some(42));
        assert_eq!(config.simulator.heartbeat_range(), 5..=30);
        assert_eq!(config.simulator.initial_pins, PinBank::factory_default());
        assert_eq!(config.device.vendor_ids.as_slice(), &[1027]);

        let json = config.to_json().unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_rejects_garbage() {
        assert!(Config::from_json("{not json").is_err());
    }
}
