pub mod dataset;
pub mod idx;
pub mod image;

pub use dataset::{labels_to_one_hot, Batch, Dataset};
pub use idx::{load_idx1_labels, load_idx3_images, parse_idx1_labels, parse_idx3_images};
pub use self::image::{load_image_input, save_column_as_image};

/// Width and height of a digit image.
pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;
