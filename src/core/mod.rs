pub mod align;
pub mod audio;
pub mod dsp;
pub mod interp;
pub mod mask;
pub mod resample;
pub mod xcorr;
