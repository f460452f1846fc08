mod nom_prelude {
  pub use nom::{
    IResult,
    error::{
      ParseError,
      FromExternalError,
      VerboseError,
    },
    sequence::*,
    combinator::*,
    character::complete::*,
    number::complete::double,
    Finish,
  };
  pub use std::str::FromStr;
  pub use std::num::ParseIntError;
}

mod common;

mod homberger;
pub use homberger::{HombergerFmt, HombergerText, detect_layout};

pub trait ParseInstance<Fmt>: Sized {
  type Options;

  fn parse(inputs: Fmt, opt: &Self::Options) -> crate::Result<Self>;
}
