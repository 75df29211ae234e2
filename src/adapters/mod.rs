//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                     |
//! |-------------|---------------------|---------------------------------|
//! | `hardware`  | Clock, SensorPort   | simulated GNSS, PMIC, IMU       |
//! | `log_sink`  | EventSink           | `log` output                    |
//! | `nvs`       | ConfigPort          | in-memory block store           |
//! |             | StoragePort         |                                 |
//! | `sim_modem` | Transport           | simulated Wi-Fi/MQTT AT modem   |
//! | `sim_peer`  | PeerLink            | simulated BLE companion MCU     |
//! | `time`      | Clock               | host monotonic clock            |
//!
//! The simulated modem and peer answer into the same
//! [`FrameQueue`](crate::link::channels::FrameQueue)s a UART interrupt
//! would fill, through a real [`FrameReceiver`](crate::link::receiver::FrameReceiver).

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod sim_modem;
pub mod sim_peer;
pub mod time;
