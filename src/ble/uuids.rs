//! BLE Service and Characteristic UUIDs.
//!
//! The tire sensors currently expose their reading on the standard Battery
//! Service / Battery Level slots. Production hardware with its own UUIDs is
//! configured through [`ManagerConfig`](crate::config::ManagerConfig).

use uuid::Uuid;

/// Tire data service UUID (Battery Service, 0x180F).
pub const TIRE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb);

/// Tire data characteristic UUID (Battery Level, 0x2A19, Read/Notify).
pub const TIRE_DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_2a19_0000_1000_8000_00805f9b34fb);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            TIRE_SERVICE_UUID.to_string(),
            "0000180f-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            TIRE_DATA_CHARACTERISTIC_UUID.to_string(),
            "00002a19-0000-1000-8000-00805f9b34fb"
        );
    }
}
