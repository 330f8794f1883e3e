mod otsu;

pub use otsu::{draw_significant_contours, otsu_inverse, rank_contours, significant_contours, OtsuContours};
