use super::nom_prelude::*;

pub fn i64_<'a, E>(input: &'a str) -> IResult<&'a str, i64, E>
  where
    E: ParseError<&'a str> + FromExternalError<&'a str, ParseIntError>
{
  map_res(
    recognize(
      pair(
        opt(one_of("+-")),
        digit1
      )
    ), i64::from_str)(input)
}

/// Parses a whole whitespace-free token as an integer.
pub fn int_token(token: &str) -> Option<i64> {
  all_consuming(i64_::<VerboseError<&str>>)(token)
    .finish()
    .ok()
    .map(|(_, v)| v)
}

/// Parses a whole whitespace-free token as a float (`nan` and `inf` included).
pub fn float_token(token: &str) -> Option<f64> {
  all_consuming(double::<&str, VerboseError<&str>>)(token)
    .finish()
    .ok()
    .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn signed_ints() {
    assert_eq!(int_token("42"), Some(42));
    assert_eq!(int_token("-5"), Some(-5));
    assert_eq!(int_token("+7"), Some(7));
    assert_eq!(int_token("4.0"), None);
    assert_eq!(int_token("12a"), None);
    assert_eq!(int_token("-"), None);
    assert_eq!(int_token("99999999999999999999"), None);
  }

  #[test]
  fn floats() {
    assert_eq!(float_token("70"), Some(70.0));
    assert_eq!(float_token("-3.25"), Some(-3.25));
    assert_eq!(float_token("1e3"), Some(1000.0));
    assert_eq!(float_token("12,5"), None);
    assert_eq!(float_token("north"), None);
  }
}
