use core::time::Duration;

//--------------------------- CPPM ---------------------------//

pub const CPPM_CHANNEL_COUNT: usize = 8;
// in us, a high half at least this long is the gap between frames
pub const CPPM_SYNC_MIN_US: i64 = 4000;
// in us. Tuned for the GPIO interrupt jitter seen on the Navio, not taken from
// any transmitter datasheet
pub const CPPM_LOW_LIMIT_US: i64 = 600;

//----------------------- RC pipeline ------------------------//

pub const EDGE_QUEUE_DEPTH: usize = 256;
pub const FRAME_QUEUE_DEPTH: usize = 8;
pub const FRAME_SUBSCRIBER_DEPTH: usize = 8;
pub const MAX_FRAME_SUBSCRIBERS: usize = 4;
pub const FRAME_INTERVAL_SAMPLES: usize = 16;

// how long a worker sleeps on an empty queue before rechecking the stop flag
pub const WORKER_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

// BCM pin the Navio routes the RC receiver to
pub const RC_INPUT_GPIO_PIN: u8 = 4;

//-------------------------- PCA9685 -------------------------//

pub const PWM_TICKS_PER_CYCLE: u16 = 4096;
pub const PWM_MAXIMUM: u16 = 0x0fff;
// "always" sentinel for the on and off counters
pub const PWM_ALWAYS: u16 = 0x1000;

pub const PCA9685_CHANNEL_COUNT: usize = 16;
// index of the "all call" register group
pub const PCA9685_ALL_CHANNELS: usize = PCA9685_CHANNEL_COUNT;
pub const PCA9685_INTERNAL_CLOCK_HZ: u32 = 25_000_000;
pub const PCA9685_CLOCK_MAXIMUM_HZ: u32 = 50_000_000;
pub const PCA9685_PRESCALE_MINIMUM: u8 = 3;
pub const PCA9685_PRESCALE_MAXIMUM: u8 = 255;
// power-on value, about 125 Hz with the internal clock
pub const PCA9685_PRESCALE_DEFAULT: u8 = 0x30;
pub const PCA9685_MODE_SWITCH_DELAY: Duration = Duration::from_millis(1);
pub const SERVO_SAFE_FREQUENCY_HZ: u32 = 50;

// registers
pub const PCA9685_MODE1: u8 = 0x00;
pub const PCA9685_CHANNEL_START: u8 = 0x06;
pub const PCA9685_CHANNEL_SIZE: u8 = 4;
pub const PCA9685_ALL_CHANNELS_ON_LOW: u8 = 0xfa;
pub const PCA9685_ALL_CHANNELS_OFF_HIGH: u8 = 0xfd;
pub const PCA9685_PRESCALE: u8 = 0xfe;

// MODE1 bits
pub const MODE1_SLEEP: u8 = 0x10;
pub const MODE1_AUTO_INCREMENT: u8 = 0x20;
pub const MODE1_RESTART: u8 = 0x80;

// full off bit of an LEDn_OFF_H register
pub const CHANNEL_FULL_OFF: u8 = 0x10;
