use crate::Result;

pub mod homberger;

pub trait FromRaw<T> where Self: Sized {
  type Options;

  fn from_raw(raw: T, opt: &Self::Options) -> Result<Self>;
}
