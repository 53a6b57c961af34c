//! GPIO / peripheral pin assignments for the CORE Test main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// JSY1050 power meter (UART2, Modbus RTU)
// ---------------------------------------------------------------------------

/// UART RX from the meter's TX line.
pub const METER_RX_GPIO: i32 = 16;
/// UART TX to the meter's RX line.
pub const METER_TX_GPIO: i32 = 17;
/// UART port number used for the meter link.
pub const METER_UART_PORT: i32 = 2;
/// Meter line settings: 9600 8N1.
pub const METER_BAUD: u32 = 9600;

// ---------------------------------------------------------------------------
// Injector output
// ---------------------------------------------------------------------------

/// 8-bit DAC channel 1 driving the injector amplitude.
pub const INJECTOR_DAC_GPIO: i32 = 25;

/// Output relay. Active LOW: driven low to energise while RUN.
pub const RELAY_GPIO: i32 = 32;

// ---------------------------------------------------------------------------
// Front-panel indicators (active HIGH)
// ---------------------------------------------------------------------------

pub const LED_RUNTIME_GPIO: i32 = 13;
pub const LED_RUN_GPIO: i32 = 14;
pub const LED_STOP_GPIO: i32 = 27;

// ---------------------------------------------------------------------------
// Front-panel inputs (active LOW, internal pull-ups)
// ---------------------------------------------------------------------------

/// Rotary encoder clock phase.
pub const ENCODER_CLK_GPIO: i32 = 21;
/// Rotary encoder data phase.
pub const ENCODER_DT_GPIO: i32 = 19;
/// Rotary encoder push switch. Zeroes the amplitude.
pub const ENCODER_SW_GPIO: i32 = 5;
/// Menu push-button. Steps the menu backward.
pub const MENU_BUTTON_GPIO: i32 = 26;
/// Panel switch selecting the web control surface.
pub const WEB_MODE_SWITCH_GPIO: i32 = 22;
