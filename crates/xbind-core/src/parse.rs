//! String to value parsers.
//!
//! [`ValueParserFactory`] turns a target type plus its [`CustomFormat`] into
//! a reusable parser. Resolution order: built-in scalars, enums by name,
//! date/time types, then any type with a one-argument constructor taking a
//! built-in scalar.

use std::any::Any;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::accessor::{Constructor, ConstructedShape, EnumShape, WrapFn};
use crate::config::BindingConfig;
use crate::error::{Error, ParseValueError, Result};
use crate::model::{CustomFormat, ElementKind};
use crate::types::{BoxedValue, ScalarKind, TemporalKind, TypeInfo, TypeShape};

type ParseFn = dyn Fn(&str) -> std::result::Result<BoxedValue, ParseValueError> + Send + Sync;

/// Parses one string into a value of a fixed type
#[derive(Clone)]
pub struct ValueParser {
    target: TypeInfo,
    kind: ElementKind,
    parse: Arc<ParseFn>,
}

impl ValueParser {
    fn new<F>(target: TypeInfo, kind: ElementKind, parse: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<BoxedValue, ParseValueError> + Send + Sync + 'static,
    {
        Self {
            target,
            kind,
            parse: Arc::new(parse),
        }
    }

    pub fn target(&self) -> TypeInfo {
        self.target
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn parse(&self, text: &str) -> std::result::Result<BoxedValue, ParseValueError> {
        (self.parse)(text)
    }
}

impl std::fmt::Debug for ValueParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueParser")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Parses several strings and passes them positionally to one constructor
#[derive(Clone)]
pub struct MultiValueParser {
    target: TypeInfo,
    parsers: Vec<ValueParser>,
    constructor: Constructor,
}

impl std::fmt::Debug for MultiValueParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiValueParser")
            .field("target", &self.target)
            .field("arity", &self.parsers.len())
            .finish_non_exhaustive()
    }
}

impl MultiValueParser {
    pub fn target(&self) -> TypeInfo {
        self.target
    }

    pub fn arity(&self) -> usize {
        self.parsers.len()
    }

    /// Kind of each constructor argument, in order
    pub fn kinds(&self) -> Vec<ElementKind> {
        self.parsers.iter().map(ValueParser::kind).collect()
    }

    pub fn parse(&self, texts: &[&str]) -> std::result::Result<BoxedValue, ParseValueError> {
        let joined = || texts.join(", ");
        if texts.len() != self.parsers.len() {
            return Err(ParseValueError::new(
                &joined(),
                self.target.name(),
                format!("expected {} values, got {}", self.parsers.len(), texts.len()),
            ));
        }
        let args = self
            .parsers
            .iter()
            .zip(texts)
            .map(|(parser, text)| parser.parse(text))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.constructor
            .invoke(args)
            .map_err(|e| ParseValueError::new(&joined(), self.target.name(), e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateOrder {
    MonthDayYear,
    DayMonthYear,
    YearMonthDay,
}

/// Number and date conventions of a named culture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Culture {
    name: &'static str,
    decimal_separator: char,
    group_separators: &'static [char],
    date_order: DateOrder,
    date_separator: char,
}

const CULTURES: &[Culture] = &[
    Culture {
        name: "invariant",
        decimal_separator: '.',
        group_separators: &[','],
        date_order: DateOrder::MonthDayYear,
        date_separator: '/',
    },
    Culture {
        name: "en-US",
        decimal_separator: '.',
        group_separators: &[','],
        date_order: DateOrder::MonthDayYear,
        date_separator: '/',
    },
    Culture {
        name: "en-GB",
        decimal_separator: '.',
        group_separators: &[','],
        date_order: DateOrder::DayMonthYear,
        date_separator: '/',
    },
    Culture {
        name: "de-DE",
        decimal_separator: ',',
        group_separators: &['.'],
        date_order: DateOrder::DayMonthYear,
        date_separator: '.',
    },
    Culture {
        name: "fr-FR",
        decimal_separator: ',',
        group_separators: &[' ', '\u{a0}', '\u{202f}'],
        date_order: DateOrder::DayMonthYear,
        date_separator: '/',
    },
    Culture {
        name: "ja-JP",
        decimal_separator: '.',
        group_separators: &[','],
        date_order: DateOrder::YearMonthDay,
        date_separator: '/',
    },
];

impl Culture {
    pub fn invariant() -> Self {
        CULTURES[0]
    }

    /// Find a culture by name; empty names select the invariant culture
    pub fn lookup(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Self::invariant());
        }
        CULTURES
            .iter()
            .find(|culture| culture.name.eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| Error::UnknownCulture(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    /// Rewrite a localized number into Rust's `FromStr` syntax
    fn normalize_number(&self, text: &str) -> String {
        text.trim()
            .chars()
            .filter(|c| !self.group_separators.contains(c))
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect()
    }

    fn date_patterns(&self) -> Vec<String> {
        let sep = self.date_separator;
        match self.date_order {
            DateOrder::MonthDayYear => vec![format!("%m{sep}%d{sep}%Y")],
            DateOrder::DayMonthYear => vec![format!("%d{sep}%m{sep}%Y")],
            DateOrder::YearMonthDay => vec![format!("%Y{sep}%m{sep}%d")],
        }
    }
}

/// Builds [`ValueParser`]s and [`MultiValueParser`]s
pub struct ValueParserFactory<'a> {
    config: &'a BindingConfig,
}

impl<'a> ValueParserFactory<'a> {
    pub fn new(config: &'a BindingConfig) -> Self {
        Self { config }
    }

    fn culture(&self, format: &CustomFormat) -> Result<Culture> {
        match format
            .culture
            .as_deref()
            .or(self.config.default_culture.as_deref())
        {
            Some(name) => Culture::lookup(name),
            None => Ok(Culture::invariant()),
        }
    }

    /// Parser for one string into `target`
    pub fn build_single_parser(
        &self,
        target: &TypeInfo,
        format: &CustomFormat,
    ) -> Result<ValueParser> {
        match target.shape() {
            TypeShape::Scalar(kind) => Ok(scalar_parser(*target, kind, self.culture(format)?)),
            TypeShape::Enum(shape) => Ok(enum_parser(*target, shape, format.ignore_case)),
            TypeShape::Temporal(kind) => Ok(temporal_parser(
                *target,
                kind,
                format.date_time_format.clone(),
                self.culture(format)?,
                self.config.date_time_formats.clone(),
            )),
            TypeShape::Constructed(shape) => self.constructed_parser(target, shape, format),
            TypeShape::Nullable(shape) | TypeShape::Boxed(shape) => {
                let inner = self.build_single_parser(&shape.inner(), format)?;
                Ok(wrapped_parser(*target, inner, shape.wrap_fn()))
            }
            TypeShape::Model(_) => Err(Error::unsupported(
                target.name(),
                "model types are bound from nodes, not parsed from text",
            )),
            TypeShape::Fragment => Err(Error::unsupported(
                target.name(),
                "raw fragments take node markup, not parsed text",
            )),
            shape => Err(Error::unsupported(
                target.name(),
                format!("{shape:?} values cannot be parsed from a single string"),
            )),
        }
    }

    /// Parser for `arg_count` strings, through the unique constructor of
    /// `target` with exactly that many parameters
    pub fn build_multi_parser(
        &self,
        target: &TypeInfo,
        format: &CustomFormat,
        arg_count: usize,
    ) -> Result<MultiValueParser> {
        let TypeShape::Constructed(shape) = target.shape() else {
            return Err(Error::constructor(
                target.name(),
                arg_count,
                "the type declares no constructors",
            ));
        };
        let mut matching = shape
            .constructors()
            .into_iter()
            .filter(|constructor| constructor.arity() == arg_count);
        let constructor = match (matching.next(), matching.next()) {
            (Some(constructor), None) => constructor,
            (None, _) => {
                return Err(Error::constructor(
                    target.name(),
                    arg_count,
                    "no constructor has that many parameters",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::constructor(
                    target.name(),
                    arg_count,
                    "more than one constructor has that many parameters",
                ))
            }
        };
        let parsers = constructor
            .parameters()
            .iter()
            .map(|parameter| self.build_single_parser(parameter, format))
            .collect::<Result<Vec<_>>>()?;
        Ok(MultiValueParser {
            target: *target,
            parsers,
            constructor,
        })
    }

    fn constructed_parser(
        &self,
        target: &TypeInfo,
        shape: ConstructedShape,
        format: &CustomFormat,
    ) -> Result<ValueParser> {
        let (constructor, parameter) = shape
            .constructors()
            .into_iter()
            .find_map(|constructor| {
                let parameter = match constructor.parameters() {
                    [parameter] if matches!(parameter.shape(), TypeShape::Scalar(_)) => *parameter,
                    _ => return None,
                };
                Some((constructor, parameter))
            })
            .ok_or_else(|| {
                Error::constructor(
                    target.name(),
                    1,
                    "no single-argument constructor takes a built-in scalar",
                )
            })?;
        let inner = self.build_single_parser(&parameter, format)?;
        let type_name = target.name();
        Ok(ValueParser::new(*target, inner.kind(), move |text| {
            let arg = inner.parse(text)?;
            constructor
                .invoke(vec![arg])
                .map_err(|e| ParseValueError::new(text, type_name, e))
        }))
    }
}

fn wrapped_parser(target: TypeInfo, inner: ValueParser, wrap: WrapFn) -> ValueParser {
    let type_name = target.name();
    ValueParser::new(target, inner.kind(), move |text| {
        let value = inner.parse(text)?;
        wrap(value).map_err(|e| ParseValueError::new(text, type_name, e))
    })
}

fn scalar_parser(target: TypeInfo, kind: ScalarKind, culture: Culture) -> ValueParser {
    let element_kind = match kind {
        ScalarKind::String | ScalarKind::Char | ScalarKind::Uuid => ElementKind::Text,
        ScalarKind::Bool => ElementKind::Bool,
        _ => ElementKind::Number,
    };
    let type_name = target.name();
    ValueParser::new(target, element_kind, move |text| {
        parse_scalar(kind, text, &culture)
            .map_err(|reason| ParseValueError::new(text, type_name, reason))
    })
}

fn from_trimmed<T>(text: &str) -> std::result::Result<BoxedValue, String>
where
    T: FromStr + Any,
    T::Err: Display,
{
    text.trim()
        .parse::<T>()
        .map(BoxedValue::new)
        .map_err(|e| e.to_string())
}

fn parse_scalar(
    kind: ScalarKind,
    text: &str,
    culture: &Culture,
) -> std::result::Result<BoxedValue, String> {
    match kind {
        ScalarKind::String => Ok(BoxedValue::new(text.to_string())),
        ScalarKind::Char => parse_char(text),
        ScalarKind::Bool => parse_bool(text),
        ScalarKind::I8 => from_trimmed::<i8>(text),
        ScalarKind::I16 => from_trimmed::<i16>(text),
        ScalarKind::I32 => from_trimmed::<i32>(text),
        ScalarKind::I64 => from_trimmed::<i64>(text),
        ScalarKind::I128 => from_trimmed::<i128>(text),
        ScalarKind::Isize => from_trimmed::<isize>(text),
        ScalarKind::U8 => from_trimmed::<u8>(text),
        ScalarKind::U16 => from_trimmed::<u16>(text),
        ScalarKind::U32 => from_trimmed::<u32>(text),
        ScalarKind::U64 => from_trimmed::<u64>(text),
        ScalarKind::U128 => from_trimmed::<u128>(text),
        ScalarKind::Usize => from_trimmed::<usize>(text),
        ScalarKind::F32 => from_trimmed::<f32>(&culture.normalize_number(text)),
        ScalarKind::F64 => from_trimmed::<f64>(&culture.normalize_number(text)),
        ScalarKind::Decimal => parse_decimal(&culture.normalize_number(text)),
        ScalarKind::Uuid => from_trimmed::<uuid::Uuid>(text),
    }
}

fn parse_char(text: &str) -> std::result::Result<BoxedValue, String> {
    let single = |s: &str| {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    };
    single(text)
        .or_else(|| single(text.trim()))
        .map(BoxedValue::new)
        .ok_or_else(|| "expected exactly one character".to_string())
}

fn parse_bool(text: &str) -> std::result::Result<BoxedValue, String> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Ok(BoxedValue::new(true))
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Ok(BoxedValue::new(false))
    } else {
        Err("expected true, false, 1 or 0".to_string())
    }
}

fn parse_decimal(text: &str) -> std::result::Result<BoxedValue, String> {
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };
    parsed.map(BoxedValue::new).map_err(|e| e.to_string())
}

fn enum_parser(target: TypeInfo, shape: EnumShape, ignore_case: bool) -> ValueParser {
    let type_name = target.name();
    ValueParser::new(target, ElementKind::Enum, move |text| {
        shape.parse(text.trim(), ignore_case).ok_or_else(|| {
            ParseValueError::new(
                text,
                type_name,
                format!("expected one of: {}", shape.variants().join(", ")),
            )
        })
    })
}

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// A freely parsed point in time, with or without an offset
enum Moment {
    Zoned(DateTime<FixedOffset>),
    Local(NaiveDateTime),
}

fn midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

fn parse_with_formats<'f, I>(text: &str, formats: I) -> Option<Moment>
where
    I: IntoIterator<Item = &'f str>,
{
    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(Moment::Zoned(dt));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Moment::Local(dt));
        }
        if let Some(dt) = NaiveDate::parse_from_str(text, format).ok().and_then(midnight) {
            return Some(Moment::Local(dt));
        }
    }
    None
}

fn parse_moment(text: &str, culture: &Culture, extra: &[String]) -> Option<Moment> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Moment::Zoned(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(Moment::Zoned(dt));
    }
    if let Some(moment) = parse_with_formats(text, ZONED_FORMATS.iter().copied()) {
        return Some(moment);
    }
    if let Some(moment) = parse_with_formats(text, LOCAL_FORMATS.iter().copied()) {
        return Some(moment);
    }
    let mut culture_formats = vec!["%Y-%m-%d".to_string()];
    for pattern in culture.date_patterns() {
        culture_formats.push(format!("{pattern} %H:%M:%S"));
        culture_formats.push(format!("{pattern} %H:%M"));
        culture_formats.push(pattern);
    }
    parse_with_formats(text, culture_formats.iter().map(String::as_str))
        .or_else(|| parse_with_formats(text, extra.iter().map(String::as_str)))
}

fn convert_moment(kind: TemporalKind, moment: Moment) -> BoxedValue {
    match (kind, moment) {
        (TemporalKind::Date, Moment::Zoned(dt)) => BoxedValue::new(dt.date_naive()),
        (TemporalKind::Date, Moment::Local(dt)) => BoxedValue::new(dt.date()),
        (TemporalKind::Time, Moment::Zoned(dt)) => BoxedValue::new(dt.time()),
        (TemporalKind::Time, Moment::Local(dt)) => BoxedValue::new(dt.time()),
        (TemporalKind::DateTime, Moment::Zoned(dt)) => BoxedValue::new(dt.naive_local()),
        (TemporalKind::DateTime, Moment::Local(dt)) => BoxedValue::new(dt),
        (TemporalKind::Utc, Moment::Zoned(dt)) => BoxedValue::new(dt.with_timezone(&Utc)),
        (TemporalKind::Utc, Moment::Local(dt)) => BoxedValue::new(dt.and_utc()),
        (TemporalKind::FixedOffset, Moment::Zoned(dt)) => BoxedValue::new(dt),
        (TemporalKind::FixedOffset, Moment::Local(dt)) => {
            BoxedValue::new(dt.and_utc().fixed_offset())
        }
    }
}

fn parse_free(
    kind: TemporalKind,
    text: &str,
    culture: &Culture,
    extra: &[String],
) -> std::result::Result<BoxedValue, String> {
    if kind == TemporalKind::Time {
        if let Some(time) = TIME_FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
        {
            return Ok(BoxedValue::new(time));
        }
    }
    parse_moment(text, culture, extra)
        .map(|moment| convert_moment(kind, moment))
        .ok_or_else(|| "not a recognized date/time".to_string())
}

fn parse_exact(
    kind: TemporalKind,
    text: &str,
    format: &str,
) -> std::result::Result<BoxedValue, String> {
    let naive = || {
        NaiveDateTime::parse_from_str(text, format).or_else(|e| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(midnight)
                .ok_or(e)
        })
    };
    let zoned = || {
        DateTime::parse_from_str(text, format)
            .or_else(|e| naive().map(|dt| dt.and_utc().fixed_offset()).map_err(|_| e))
    };
    let parsed = match kind {
        TemporalKind::Date => NaiveDate::parse_from_str(text, format).map(BoxedValue::new),
        TemporalKind::Time => NaiveTime::parse_from_str(text, format).map(BoxedValue::new),
        TemporalKind::DateTime => naive().map(BoxedValue::new),
        TemporalKind::Utc => zoned().map(|dt| BoxedValue::new(dt.with_timezone(&Utc))),
        TemporalKind::FixedOffset => zoned().map(BoxedValue::new),
    };
    parsed.map_err(|e| e.to_string())
}

fn temporal_parser(
    target: TypeInfo,
    kind: TemporalKind,
    exact: Option<String>,
    culture: Culture,
    extra: Vec<String>,
) -> ValueParser {
    let type_name = target.name();
    ValueParser::new(target, ElementKind::DateTime, move |text| {
        let trimmed = text.trim();
        let parsed = match &exact {
            Some(format) => parse_exact(kind, trimmed, format),
            None => parse_free(kind, trimmed, &culture, &extra),
        };
        parsed.map_err(|reason| ParseValueError::new(text, type_name, reason))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{Constructors, XmlConstruct};
    use crate::types::Bindable;

    crate::xml_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Color {
            Red,
            Green,
            DarkBlue,
        }
    }

    #[derive(Debug, PartialEq)]
    struct Meters(f64);

    impl XmlConstruct for Meters {
        fn constructors(constructors: &mut Constructors<Self>) {
            constructors.add(|(value,): (f64,)| Meters(value));
        }
    }

    crate::bindable!(construct Meters);

    fn single<T: Bindable>(format: &CustomFormat) -> ValueParser {
        let config = BindingConfig::default();
        ValueParserFactory::new(&config)
            .build_single_parser(&TypeInfo::of::<T>(), format)
            .unwrap()
    }

    fn parse<T: Bindable>(text: &str) -> T {
        single::<T>(&CustomFormat::default())
            .parse(text)
            .unwrap()
            .downcast::<T>()
            .unwrap()
    }

    #[test]
    fn test_integer_round_trip() {
        for value in [i64::MIN, -1, 0, 42, i64::MAX] {
            assert_eq!(parse::<i64>(&value.to_string()), value);
        }
        for value in [0_u8, 7, u8::MAX] {
            assert_eq!(parse::<u8>(&value.to_string()), value);
        }
        assert_eq!(parse::<u128>(" 340282366920938463463374607431768211455 "), u128::MAX);
        assert_eq!(parse::<i16>("+12"), 12);
    }

    #[test]
    fn test_scalar_kinds() {
        let format = CustomFormat::default();
        assert_eq!(single::<String>(&format).kind(), ElementKind::Text);
        assert_eq!(single::<char>(&format).kind(), ElementKind::Text);
        assert_eq!(single::<bool>(&format).kind(), ElementKind::Bool);
        assert_eq!(single::<f32>(&format).kind(), ElementKind::Number);
        assert_eq!(single::<Decimal>(&format).kind(), ElementKind::Number);
        assert_eq!(single::<Color>(&format).kind(), ElementKind::Enum);
        assert_eq!(single::<NaiveDate>(&format).kind(), ElementKind::DateTime);
        assert_eq!(single::<Meters>(&format).kind(), ElementKind::Number);
    }

    #[test]
    fn test_bool_and_char() {
        assert!(parse::<bool>("TRUE"));
        assert!(parse::<bool>("1"));
        assert!(!parse::<bool>(" false "));
        assert_eq!(parse::<char>("x"), 'x');
        assert_eq!(parse::<char>(" "), ' ');
        assert!(single::<char>(&CustomFormat::default()).parse("xy").is_err());
        assert!(single::<bool>(&CustomFormat::default()).parse("yes").is_err());
    }

    #[test]
    fn test_enum_by_name() {
        for color in [Color::Red, Color::Green, Color::DarkBlue] {
            assert_eq!(parse::<Color>(&format!("{color:?}")), color);
        }

        let strict = single::<Color>(&CustomFormat::default());
        let err = strict.parse("darkblue").unwrap_err();
        assert_eq!(err.reason, "expected one of: Red, Green, DarkBlue");

        let relaxed = single::<Color>(&CustomFormat {
            ignore_case: true,
            ..CustomFormat::default()
        });
        let value = relaxed.parse("darkblue").unwrap();
        assert_eq!(value.downcast::<Color>().unwrap(), Color::DarkBlue);
    }

    #[test]
    fn test_culture_numbers() {
        let german = CustomFormat {
            culture: Some("de-DE".to_string()),
            ..CustomFormat::default()
        };
        let value = single::<f64>(&german).parse("1.234,5").unwrap();
        assert_eq!(value.downcast::<f64>().unwrap(), 1234.5);

        let value = single::<Decimal>(&german).parse("0,25").unwrap();
        assert_eq!(value.downcast::<Decimal>().unwrap(), Decimal::new(25, 2));

        assert_eq!(parse::<f64>("1,234.5"), 1234.5);
        assert_eq!(parse::<Decimal>("1.5e3"), Decimal::new(1500, 0));
    }

    #[test]
    fn test_unknown_culture() {
        let config = BindingConfig::default();
        let format = CustomFormat {
            culture: Some("tlh".to_string()),
            ..CustomFormat::default()
        };
        let err = ValueParserFactory::new(&config)
            .build_single_parser(&TypeInfo::of::<f64>(), &format)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCulture(_)));
    }

    #[test]
    fn test_iso_dates_round_trip() {
        let date = NaiveDate::from_ymd_opt(1985, 3, 24).unwrap();
        assert_eq!(parse::<NaiveDate>(&date.to_string()), date);

        let moment = date.and_hms_opt(8, 30, 15).unwrap();
        assert_eq!(parse::<NaiveDateTime>("1985-03-24T08:30:15"), moment);
        assert_eq!(parse::<NaiveDateTime>("1985-03-24 08:30:15"), moment);

        let utc = parse::<DateTime<Utc>>("1985-03-24T10:30:15+02:00");
        assert_eq!(utc.naive_utc(), moment);

        assert_eq!(
            parse::<NaiveTime>("08:30"),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_exact_and_culture_dates() {
        let exact = single::<NaiveDate>(&CustomFormat {
            date_time_format: Some("%d-%m-%Y".to_string()),
            ..CustomFormat::default()
        });
        let value = exact.parse("24-03-1985").unwrap();
        assert_eq!(
            value.downcast::<NaiveDate>().unwrap(),
            NaiveDate::from_ymd_opt(1985, 3, 24).unwrap()
        );
        assert!(exact.parse("1985-03-24").is_err());

        let british = single::<NaiveDate>(&CustomFormat {
            culture: Some("en-GB".to_string()),
            ..CustomFormat::default()
        });
        let value = british.parse("02/03/2001").unwrap();
        assert_eq!(
            value.downcast::<NaiveDate>().unwrap(),
            NaiveDate::from_ymd_opt(2001, 3, 2).unwrap()
        );
        assert_eq!(
            parse::<NaiveDate>("02/03/2001"),
            NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()
        );
    }

    #[test]
    fn test_single_argument_constructor() {
        assert_eq!(parse::<Meters>("2.5"), Meters(2.5));
        assert_eq!(parse::<Option<u32>>("9"), Some(9));
    }

    #[test]
    fn test_multi_parser_arity() {
        let config = BindingConfig::default();
        let factory = ValueParserFactory::new(&config);
        let format = CustomFormat::default();

        let parser = factory
            .build_multi_parser(&TypeInfo::of::<(String, i32)>(), &format, 2)
            .unwrap();
        assert_eq!(parser.kinds(), vec![ElementKind::Text, ElementKind::Number]);
        assert!(format!("{parser:?}").contains("arity: 2"));
        let value = parser.parse(&["Ada", "36"]).unwrap();
        assert_eq!(
            value.downcast::<(String, i32)>().unwrap(),
            ("Ada".to_string(), 36)
        );

        let err = factory
            .build_multi_parser(&TypeInfo::of::<(String, i32)>(), &format, 3)
            .unwrap_err();
        assert!(matches!(err, Error::Constructor { arity: 3, .. }));

        let err = factory
            .build_multi_parser(&TypeInfo::of::<u8>(), &format, 2)
            .unwrap_err();
        assert!(matches!(err, Error::Constructor { .. }));
    }
}
