//! Binary mathematical morphology on 0/1 masks
//!
//! - **Erosion**: keep a cell only if the whole element is set
//! - **Dilation**: set a cell if any element cell is set
//! - **Opening**: erosion then dilation (removes speckle)
//! - **Closing**: dilation then erosion (fills pinholes)

mod closing;
mod dilate;
mod element;
mod erode;
mod opening;

pub use closing::{closing, Closing, ClosingParams};
pub use dilate::{dilate, Dilate, DilateParams};
pub use element::StructuringElement;
pub use erode::{erode, Erode, ErodeParams};
pub use opening::{opening, Opening, OpeningParams};
