use embassy_time::Duration;

/// High time of `RESET` before the reset pulse starts
pub fn reset_settle_time() -> Duration {
    Duration::from_millis(10)
}

/// Low time of `RESET` to trigger a module reboot
pub fn reset_time() -> Duration {
    Duration::from_millis(100)
}

/// Time to wait for the module to boot after `RESET` is released
pub fn boot_time() -> Duration {
    Duration::from_secs(3)
}

/// `AT+CFUN=1` can take several seconds while the radio starts
pub fn functionality_time() -> Duration {
    Duration::from_secs(10)
}

/// Bearer open/query and `AT+HTTPINIT`
pub fn bearer_time() -> Duration {
    Duration::from_secs(10)
}

/// Cell based positioning needs a network round trip
pub fn location_time() -> Duration {
    Duration::from_secs(10)
}

/// HTTP parameter commands that touch the bearer
pub fn http_param_time() -> Duration {
    Duration::from_secs(5)
}
