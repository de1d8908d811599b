fn main() {
    println!("cargo:rerun-if-env-changed=PILSNER_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=PILSNER_WIFI_PASSPHRASE");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
