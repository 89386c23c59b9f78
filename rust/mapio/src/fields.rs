// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading fixed-width record fields back out of merged attributes.

use retromap_graph::{AttrValue, Attributes};

use crate::error::{Error, Result};

/// Integer value of `name`, rounding floats. Missing attributes read as 0.
pub(crate) fn int_value(attributes: &Attributes, name: &'static str) -> Result<i64> {
    match attributes.get(name) {
        None => Ok(0),
        Some(v) => v
            .as_int()
            .or_else(|| v.as_float().map(|f| f.round() as i64))
            .ok_or_else(|| Error::malformed("attribute", format!("`{}` is not a number", name))),
    }
}

pub(crate) fn narrow<T: TryFrom<i64>>(value: i64, what: &'static str) -> Result<T> {
    T::try_from(value).map_err(|_| Error::Overflow { what, value })
}

/// `name` narrowed to the record field type.
pub(crate) fn field<T: TryFrom<i64>>(attributes: &Attributes, name: &'static str) -> Result<T> {
    narrow(int_value(attributes, name)?, name)
}

/// String value of `name`, or `fallback` when missing.
pub(crate) fn str_value(
    attributes: &Attributes,
    name: &'static str,
    fallback: &str,
) -> Result<String> {
    match attributes.get(name) {
        None => Ok(fallback.to_string()),
        Some(AttrValue::Str(s)) => Ok(s.clone()),
        Some(_) => Err(Error::malformed(
            "attribute",
            format!("`{}` is not a string", name),
        )),
    }
}

/// Map coordinate rounded to the nearest integer unit.
pub(crate) fn coordinate<T: TryFrom<i64>>(v: f64, what: &'static str) -> Result<T> {
    let rounded = v.round();
    if !rounded.is_finite() {
        return Err(Error::Overflow { what, value: 0 });
    }
    narrow(rounded as i64, what)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_narrows() {
        let mut attrs = Attributes::default();
        attrs.insert("shade".into(), AttrValue::Float(-3.6));
        attrs.insert("picnum".into(), AttrValue::Int(70_000));
        attrs.insert("name".into(), AttrValue::Str("STARTAN3".into()));

        assert_eq!(field::<i8>(&attrs, "shade").unwrap(), -4);
        assert_eq!(field::<i16>(&attrs, "missing").unwrap(), 0);
        assert!(matches!(
            field::<i16>(&attrs, "picnum"),
            Err(Error::Overflow { what: "picnum", value: 70_000 })
        ));
        assert!(field::<i16>(&attrs, "name").is_err());
        assert_eq!(str_value(&attrs, "name", "-").unwrap(), "STARTAN3");
        assert_eq!(str_value(&attrs, "other", "-").unwrap(), "-");
        assert_eq!(coordinate::<i16>(12.5, "x").unwrap(), 13);
        assert!(coordinate::<i16>(40_000.0, "x").is_err());
    }
}
