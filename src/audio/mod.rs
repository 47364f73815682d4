pub mod buffer;
pub mod resampler;
pub mod wav;

pub use buffer::AudioBuffer;
pub use resampler::{resample_to_len, AudioResampler};
pub use wav::{read_wav, write_wav};
