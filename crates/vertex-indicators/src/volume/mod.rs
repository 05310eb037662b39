mod volume_ma;

pub use volume_ma::VolumeMovingAverage;
