//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions and the injector DAC using raw ESP-IDF sys
//! calls. Called once from `main()` before the control loop starts. The
//! meter UART is owned by [`UartLink`](super::uart_link::UartLink).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    DacInitFailed(i32),
    UartInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::DacInitFailed(rc)    => write!(f, "DAC channel init failed (rc={})", rc),
            Self::UartInitFailed(rc)   => write!(f, "meter UART init failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::GpioConfigFailed(_) => Self::Init("gpio"),
            HwInitError::DacInitFailed(_) => Self::Init("dac"),
            HwInitError::UartInitFailed(_) => Self::Init("uart"),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_dac()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    // All panel inputs are active-low against the internal pull-ups and
    // sampled from the control loop, so no interrupts are enabled.
    let input_pins = [
        pins::ENCODER_CLK_GPIO,
        pins::ENCODER_DT_GPIO,
        pins::ENCODER_SW_GPIO,
        pins::MENU_BUTTON_GPIO,
        pins::WEB_MODE_SWITCH_GPIO,
    ];

    for &pin in &input_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Host builds read every input as released (pulled up).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    // (pin, boot level). The relay is active-low, so it boots high (open).
    let output_pins = [
        (pins::LED_RUNTIME_GPIO, 0),
        (pins::LED_RUN_GPIO, 0),
        (pins::LED_STOP_GPIO, 1),
        (pins::RELAY_GPIO, 1),
    ];

    for &(pin, level) in &output_pins {
        // Latch the boot level before the pin becomes an output so the
        // relay never glitches closed.
        unsafe { gpio_set_level(pin, level) };
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, level) };
    }

    info!("hw_init: GPIO outputs configured (relay open)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_gpio_outputs(). Main-loop only.
    unsafe { gpio_set_level(pin, if high { 1 } else { 0 }); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── DAC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut DAC_HANDLE: dac_oneshot_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// control-loop write path. `init_dac()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn dac_handle() -> dac_oneshot_handle_t {
    unsafe { DAC_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_dac() -> Result<(), HwInitError> {
    // GPIO25 is DAC channel 0 in the oneshot driver's numbering.
    let cfg = dac_oneshot_config_t {
        chan_id: dac_channel_t_DAC_CHAN_0,
    };
    // SAFETY: DAC_HANDLE is only written here, once at boot.
    let ret = unsafe { dac_oneshot_new_channel(&cfg, &raw mut DAC_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::DacInitFailed(ret)); }

    let ret = unsafe { dac_oneshot_output_voltage(dac_handle(), 0) };
    if ret != ESP_OK as i32 { return Err(HwInitError::DacInitFailed(ret)); }

    info!("hw_init: DAC configured (GPIO{}, level 0)", pins::INJECTOR_DAC_GPIO);
    Ok(())
}

/// Drive the injector DAC. A failed write is logged and otherwise ignored;
/// the next amplitude change retries.
#[cfg(target_os = "espidf")]
pub fn dac_write(level: u8) {
    // SAFETY: dac_handle() contract, control-loop access only.
    let ret = unsafe { dac_oneshot_output_voltage(dac_handle(), level) };
    if ret != ESP_OK as i32 {
        log::warn!("hw_init: DAC write failed (rc={})", ret);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn dac_write(_level: u8) {}
