use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::rc::Rc;

/// Ordered PHP array with the next auto-increment index
/// (`HashTable::nNextFreeElement`).
#[derive(Debug, Clone, Default)]
pub struct ArrayData {
    pub map: IndexMap<ArrayKey, Val>,
    pub next_free: i64,
}

impl ArrayData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: IndexMap::with_capacity(capacity),
            next_free: 0,
        }
    }

    /// Insert or overwrite. An overwritten key keeps its original position.
    pub fn insert(&mut self, key: ArrayKey, value: Val) -> Option<Val> {
        if let ArrayKey::Int(i) = &key
            && *i >= self.next_free
        {
            self.next_free = i.saturating_add(1);
        }
        self.map.insert(key, value)
    }

    pub fn next_index(&self) -> i64 {
        self.next_free
    }

    /// Append with the next auto-increment key.
    pub fn push(&mut self, value: Val) {
        let key = ArrayKey::Int(self.next_free);
        self.next_free = self.next_free.saturating_add(1);
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Val> {
        self.map.get(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Val)> {
        self.map.iter()
    }

    /// Keys are exactly `0..len` in order.
    pub fn is_list(&self) -> bool {
        self.map
            .keys()
            .enumerate()
            .all(|(i, key)| matches!(key, ArrayKey::Int(k) if *k == i as i64))
    }
}

impl FromIterator<Val> for ArrayData {
    fn from_iter<I: IntoIterator<Item = Val>>(iter: I) -> Self {
        let mut data = ArrayData::new();
        for value in iter {
            data.push(value);
        }
        data
    }
}

impl FromIterator<(ArrayKey, Val)> for ArrayData {
    fn from_iter<I: IntoIterator<Item = (ArrayKey, Val)>>(iter: I) -> Self {
        let mut data = ArrayData::new();
        for (key, value) in iter {
            data.insert(key, value);
        }
        data
    }
}

impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        // next_free is bookkeeping, not content
        self.map == other.map
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(Rc<str>),
}

impl ArrayKey {
    /// String key with PHP normalisation: canonical decimal integers
    /// (`"8"`, `"-3"`, but not `"08"` or `"-0"`) become integer keys.
    pub fn from_str_key(s: &str) -> ArrayKey {
        match canonical_int(s) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(Rc::from(s)),
        }
    }

    /// Key for an arbitrary value, `None` for arrays (illegal offset type).
    pub fn from_val(val: &Val) -> Option<ArrayKey> {
        Some(match val {
            Val::Null => ArrayKey::Str(Rc::from("")),
            Val::Bool(b) => ArrayKey::Int(*b as i64),
            Val::Int(i) => ArrayKey::Int(*i),
            Val::Float(f) => ArrayKey::Int(float_to_int(*f)),
            Val::String(s) => ArrayKey::from_str_key(s),
            Val::Array(_) => return None,
        })
    }

    pub fn to_val(&self) -> Val {
        match self {
            ArrayKey::Int(i) => Val::Int(*i),
            ArrayKey::Str(s) => Val::String(s.clone()),
        }
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::from_str_key(s)
    }
}

fn canonical_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if (digits.len() > 1 && digits.starts_with('0')) || s == "-0" {
        return None;
    }
    s.parse::<i64>().ok()
}

/// A constant value: everything a constant expression can evaluate to.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Val {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Array(Rc<ArrayData>),
}

impl Val {
    pub fn string(s: impl Into<Rc<str>>) -> Val {
        Val::String(s.into())
    }

    pub fn array(data: ArrayData) -> Val {
        Val::Array(Rc::new(data))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::String(_) => "string",
            Val::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) => Some(s),
            _ => None,
        }
    }

    /// Zend `zend_is_true`.
    pub fn to_bool(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::String(s) => !(s.is_empty() || &**s == "0"),
            Val::Array(arr) => !arr.is_empty(),
        }
    }

    /// Zend `zval_get_long`.
    pub fn to_int(&self) -> i64 {
        match self {
            Val::Null => 0,
            Val::Bool(b) => *b as i64,
            Val::Int(i) => *i,
            Val::Float(f) => float_to_int(*f),
            Val::String(s) => match scan_number(s) {
                Some((Val::Int(i), _)) => i,
                Some((Val::Float(f), _)) => float_to_int(f),
                _ => 0,
            },
            Val::Array(arr) => !arr.is_empty() as i64,
        }
    }

    /// Zend `zval_get_double`.
    pub fn to_float(&self) -> f64 {
        match self {
            Val::Null => 0.0,
            Val::Bool(b) => *b as i64 as f64,
            Val::Int(i) => *i as f64,
            Val::Float(f) => *f,
            Val::String(s) => match scan_number(s) {
                Some((Val::Int(i), _)) => i as f64,
                Some((Val::Float(f), _)) => f,
                _ => 0.0,
            },
            Val::Array(arr) => !arr.is_empty() as i64 as f64,
        }
    }

    /// Numeric value used by arithmetic: `Int` or `Float`. Strings use
    /// their leading numeric prefix.
    pub fn to_number(&self) -> Val {
        match self {
            Val::Int(_) | Val::Float(_) => self.clone(),
            Val::String(s) => match scan_number(s) {
                Some((number, _)) => number,
                None => Val::Int(0),
            },
            _ => Val::Int(self.to_int()),
        }
    }

    /// The number a fully numeric string denotes (leading and trailing
    /// whitespace allowed), `None` for anything else.
    pub fn numeric_string(s: &str) -> Option<Val> {
        match scan_number(s) {
            Some((number, true)) => Some(number),
            _ => None,
        }
    }

    /// String conversion (`zend_make_printable_zval`).
    pub fn to_php_string(&self) -> Rc<str> {
        match self {
            Val::String(s) => s.clone(),
            Val::Null | Val::Bool(false) => Rc::from(""),
            Val::Bool(true) => Rc::from("1"),
            Val::Int(i) => Rc::from(i.to_string()),
            Val::Float(f) => Rc::from(format_float(*f, 14)),
            Val::Array(_) => Rc::from("Array"),
        }
    }

    /// `(array)` cast.
    pub fn to_array(&self) -> Rc<ArrayData> {
        match self {
            Val::Array(arr) => arr.clone(),
            Val::Null => Rc::new(ArrayData::new()),
            other => Rc::new(std::iter::once(other.clone()).collect()),
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<f64> for Val {
    fn from(f: f64) -> Self {
        Val::Float(f)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::String(Rc::from(s))
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::String(Rc::from(s))
    }
}

impl From<ArrayData> for Val {
    fn from(data: ArrayData) -> Self {
        Val::Array(Rc::new(data))
    }
}

/// Zend `zend_dval_to_lval`: out of range and non-finite values give 0.
pub fn float_to_int(f: f64) -> i64 {
    if !f.is_finite() || f >= 9.223_372_036_854_775_808e18 || f < -9.223_372_036_854_775_808e18 {
        0
    } else {
        f as i64
    }
}

/// Scan the leading numeric prefix of a string. Returns the number and
/// whether the whole string (modulo surrounding whitespace) was numeric.
fn scan_number(s: &str) -> Option<(Val, bool)> {
    let bytes = s.as_bytes();
    let is_ws = |b: u8| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c);
    let mut i = 0;
    while i < bytes.len() && is_ws(bytes[i]) {
        i += 1;
    }
    let start = i;
    if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut is_float = false;
    if i < bytes.len() && bytes[i] == b'.' {
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if int_digits > 0 || j > i + 1 {
            is_float = true;
            i = j;
        }
    }
    if int_digits == 0 && !is_float {
        return None;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            is_float = true;
            i = j;
        }
    }

    let text = &s[start..i];
    let number = if is_float {
        Val::Float(text.parse().unwrap_or(0.0))
    } else {
        match text.parse::<i64>() {
            Ok(n) => Val::Int(n),
            Err(_) => Val::Float(text.parse().unwrap_or(0.0)),
        }
    };

    let mut end = i;
    while end < bytes.len() && is_ws(bytes[end]) {
        end += 1;
    }
    Some((number, end == bytes.len()))
}

/// `%.{precision}G` the way PHP prints floats: trailing zeros dropped,
/// exponent form as `1.0E+25`.
pub fn format_float(f: f64, precision: usize) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= precision as i32 {
        let mut mantissa = trim_fraction(mantissa).to_string();
        if !mantissa.contains('.') {
            mantissa.push_str(".0");
        }
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}E{sign}{}", exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{f:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Shortest round-trip rendering used by `var_export` (always shows a
/// fractional part or exponent).
fn export_float(f: f64) -> String {
    if !f.is_finite() {
        return format_float(f, 17);
    }
    let repr = format!("{f:?}");
    match repr.split_once('e') {
        Some((mantissa, exp)) => {
            let mantissa = if mantissa.contains('.') {
                mantissa.to_string()
            } else {
                format!("{mantissa}.0")
            };
            let exp = exp.parse::<i32>().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{}", exp.abs())
        }
        None => repr,
    }
}

fn export_string(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl Val {
    fn export(&self, out: &mut String, indent: usize) {
        match self {
            Val::Null => out.push_str("NULL"),
            Val::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Val::Int(i) => out.push_str(&i.to_string()),
            Val::Float(f) => out.push_str(&export_float(*f)),
            Val::String(s) => out.push_str(&export_string(s)),
            Val::Array(arr) => {
                out.push_str("array (\n");
                let pad = " ".repeat(indent + 2);
                for (key, value) in arr.iter() {
                    out.push_str(&pad);
                    match key {
                        ArrayKey::Int(i) => out.push_str(&i.to_string()),
                        ArrayKey::Str(s) => out.push_str(&export_string(s)),
                    }
                    out.push_str(" => ");
                    if matches!(value, Val::Array(_)) {
                        out.push('\n');
                        out.push_str(&pad);
                    }
                    value.export(out, indent + 2);
                    out.push_str(",\n");
                }
                out.push_str(&" ".repeat(indent));
                out.push(')');
            }
        }
    }
}

/// `var_export` rendering.
impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.export(&mut out, 0);
        f.write_str(&out)
    }
}

impl Serialize for Val {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Val::Null => serializer.serialize_unit(),
            Val::Bool(b) => serializer.serialize_bool(*b),
            Val::Int(i) => serializer.serialize_i64(*i),
            Val::Float(f) => serializer.serialize_f64(*f),
            Val::String(s) => serializer.serialize_str(s),
            Val::Array(arr) if arr.is_list() => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for value in arr.map.values() {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Val::Array(arr) => {
                let mut map = serializer.serialize_map(Some(arr.len()))?;
                for (key, value) in arr.iter() {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_key_normalisation() {
        assert_eq!(ArrayKey::from("8"), ArrayKey::Int(8));
        assert_eq!(ArrayKey::from("-3"), ArrayKey::Int(-3));
        assert_eq!(ArrayKey::from("08"), ArrayKey::Str(Rc::from("08")));
        assert_eq!(ArrayKey::from("-0"), ArrayKey::Str(Rc::from("-0")));
        assert_eq!(ArrayKey::from_val(&Val::Float(1.9)), Some(ArrayKey::Int(1)));
        assert_eq!(ArrayKey::from_val(&Val::Bool(true)), Some(ArrayKey::Int(1)));
        assert_eq!(ArrayKey::from_val(&Val::Null), Some(ArrayKey::Str(Rc::from(""))));
        assert_eq!(ArrayKey::from_val(&Val::array(ArrayData::new())), None);
    }

    #[test]
    fn test_next_free_follows_largest_int_key() {
        let mut arr = ArrayData::new();
        arr.insert(ArrayKey::from("x"), Val::Int(1));
        arr.push(Val::Int(2));
        arr.insert(ArrayKey::Int(7), Val::Int(3));
        arr.push(Val::Int(4));
        let keys: Vec<_> = arr.map.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                ArrayKey::from("x"),
                ArrayKey::Int(0),
                ArrayKey::Int(7),
                ArrayKey::Int(8)
            ]
        );
    }

    #[test]
    fn test_conversions() {
        assert!(!Val::from("0").to_bool());
        assert!(Val::from("0.0").to_bool());
        assert_eq!(Val::from("  12abc").to_int(), 12);
        assert_eq!(Val::from("1.5e3").to_float(), 1500.0);
        assert_eq!(Val::from("abc").to_int(), 0);
        assert_eq!(Val::Float(f64::NAN).to_int(), 0);
        assert_eq!(Val::numeric_string(" 42 "), Some(Val::Int(42)));
        assert_eq!(Val::numeric_string("42abc"), None);
    }

    #[test]
    fn test_float_to_string() {
        assert_eq!(&*Val::Float(1.0).to_php_string(), "1");
        assert_eq!(&*Val::Float(0.1 + 0.2).to_php_string(), "0.3");
        assert_eq!(&*Val::Float(1e14).to_php_string(), "1.0E+14");
        assert_eq!(&*Val::Float(-1.5e-7).to_php_string(), "-1.5E-7");
        assert_eq!(&*Val::Float(f64::INFINITY).to_php_string(), "INF");
    }

    #[test]
    fn test_var_export_display() {
        let mut arr = ArrayData::new();
        arr.insert(ArrayKey::from("a"), Val::Float(1.0));
        arr.push(Val::from("it's"));
        assert_eq!(
            Val::array(arr).to_string(),
            "array (\n  'a' => 1.0,\n  0 => 'it\\'s',\n)"
        );
        assert_eq!(Val::Null.to_string(), "NULL");
    }
}
