//! Build script for the wifimgr ESP32 firmware.
//!
//! Exports the ESP-IDF environment that esp-idf-svc needs to find the IDF
//! toolchain.

fn main() {
    embuild::espidf::sysenv::output();
}
