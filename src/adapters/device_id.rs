//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable device ID in the form `CORE_ESP32_<hex>`: the first
//! four MAC bytes read as a little-endian word, lowercase hex without
//! padding. It is attached to every cloud submission, so the format must
//! stay stable across firmware versions.

/// Fixed-size device ID string: "CORE_ESP32_" + up to 8 hex digits.
pub type DeviceIdString = heapless::String<24>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the six bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    use core::fmt::Write;
    let word = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);
    let _ = write!(id, "CORE_ESP32_{:x}", word);
    id
}
