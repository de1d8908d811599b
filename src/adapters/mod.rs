//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                   |
//! |------------|-------------|-------------------------------|
//! | `flash`    | FlashPort   | SPI program flash / in-memory |
//! | `log_sink` | EventSink   | Serial log output             |
//! | `probe`    | ProbePort   | ESP32 ADC1 thermistor         |
//! | `time`     | (clock)     | ESP32 system timer            |
//! | `wifi`     | NetworkPort | ESP-IDF WiFi STA + SNTP       |

pub mod flash;
pub mod log_sink;
pub mod probe;
pub mod time;
pub mod wifi;
