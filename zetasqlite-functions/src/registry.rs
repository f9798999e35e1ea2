//! The three-kind registry (`spec.md §4.2`) consulted by both the binding
//! layer and the catalog's schema view.

use std::collections::HashMap;

use zetasqlite_value::{TypeTag, Value};

use crate::aggregate::{self, Aggregator, BitOp};
use crate::error::Result;
use crate::scalar;

pub type ScalarFn = fn(&[Option<Value>]) -> Result<Option<Value>>;
pub type AggregatorCtor = fn() -> Box<dyn Aggregator>;

pub struct ScalarEntry {
    pub name: &'static str,
    pub func: ScalarFn,
    pub return_type: TypeTag,
    /// Whether repeated calls with the same arguments always produce the
    /// same result. `RAND`/`CURRENT_*` are the only exceptions; the binding
    /// layer (C3) withholds `SQLITE_DETERMINISTIC` from those.
    pub deterministic: bool,
}

pub struct AggregateEntry {
    pub name: &'static str,
    pub ctor: AggregatorCtor,
    pub return_type: TypeTag,
}

#[derive(Default)]
pub struct FunctionRegistry {
    scalars: HashMap<&'static str, ScalarEntry>,
    aggregates: HashMap<&'static str, AggregateEntry>,
    window_aggregates: HashMap<&'static str, AggregateEntry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut reg = Self::default();
        reg.register_scalars();
        reg.register_aggregates();
        reg.register_window_aggregates();
        reg
    }

    fn add_scalar(&mut self, name: &'static str, func: ScalarFn, return_type: TypeTag) {
        self.add_scalar_with(name, func, return_type, true);
    }

    fn add_volatile_scalar(&mut self, name: &'static str, func: ScalarFn, return_type: TypeTag) {
        self.add_scalar_with(name, func, return_type, false);
    }

    fn add_scalar_with(&mut self, name: &'static str, func: ScalarFn, return_type: TypeTag, deterministic: bool) {
        self.scalars.insert(name, ScalarEntry { name, func, return_type, deterministic });
    }

    fn add_aggregate(&mut self, name: &'static str, ctor: AggregatorCtor, return_type: TypeTag) {
        self.aggregates.insert(name, AggregateEntry { name, ctor, return_type });
    }

    fn add_window_aggregate(&mut self, name: &'static str, ctor: AggregatorCtor, return_type: TypeTag) {
        self.window_aggregates
            .insert(name, AggregateEntry { name, ctor, return_type });
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarEntry> {
        self.scalars.get(&name.to_ascii_uppercase()[..])
    }

    pub fn aggregate(&self, name: &str) -> Option<&AggregateEntry> {
        self.aggregates.get(&name.to_ascii_uppercase()[..])
    }

    pub fn window_aggregate(&self, name: &str) -> Option<&AggregateEntry> {
        self.window_aggregates.get(&name.to_ascii_uppercase()[..])
    }

    pub fn scalars(&self) -> impl Iterator<Item = &ScalarEntry> {
        self.scalars.values()
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &AggregateEntry> {
        self.aggregates.values()
    }

    pub fn window_aggregates(&self) -> impl Iterator<Item = &AggregateEntry> {
        self.window_aggregates.values()
    }

    fn register_scalars(&mut self) {
        use TypeTag::*;
        self.add_scalar("ADD", scalar::add, Float);
        self.add_scalar("SUB", scalar::sub, Float);
        self.add_scalar("MUL", scalar::mul, Float);
        self.add_scalar("DIV", scalar::div, Float);
        self.add_scalar("SAFE_DIV", scalar::safe_div, Float);
        self.add_scalar("MOD", scalar::modulo, Int);
        self.add_scalar("DIV_INT", scalar::div_int, Int);
        self.add_scalar("EQ", scalar::eq, Bool);
        self.add_scalar("NE", scalar::ne, Bool);
        self.add_scalar("LT", scalar::lt, Bool);
        self.add_scalar("LTE", scalar::lte, Bool);
        self.add_scalar("GT", scalar::gt, Bool);
        self.add_scalar("GTE", scalar::gte, Bool);
        self.add_scalar("IS_DISTINCT_FROM", scalar::is_distinct_from, Bool);
        self.add_scalar("AND", scalar::and, Bool);
        self.add_scalar("OR", scalar::or, Bool);
        self.add_scalar("NOT", scalar::not, Bool);
        self.add_scalar("IF", scalar::if_, String);
        self.add_scalar("IFNULL", scalar::ifnull, String);
        self.add_scalar("NULLIF", scalar::nullif, String);
        self.add_scalar("COALESCE", scalar::coalesce, String);
        self.add_scalar("IS_NULL", scalar::is_null, Bool);
        self.add_scalar("IS_TRUE", scalar::is_true, Bool);
        self.add_scalar("IS_FALSE", scalar::is_false, Bool);
        self.add_scalar("IS_NAN", scalar::is_nan, Bool);
        self.add_scalar("IS_INF", scalar::is_inf, Bool);
        self.add_scalar("CONCAT", scalar::concat, String);
        self.add_scalar("LIKE", scalar::like, Bool);
        self.add_scalar("LENGTH", scalar::length, Int);
        self.add_scalar("ARRAY_OFFSET", scalar::array_offset, String);
        self.add_scalar("ARRAY_SAFE_OFFSET", scalar::safe_array_offset, String);
        self.add_scalar("ARRAY_ORDINAL", scalar::array_ordinal, String);
        self.add_scalar("ARRAY_SAFE_ORDINAL", scalar::safe_array_ordinal, String);
        self.add_scalar("ARRAY_IN", scalar::array_in, Bool);
        self.add_scalar("ARRAY_CONCAT", scalar::array_concat, Array);
        self.add_scalar("ARRAY_LENGTH", scalar::array_length, Int);
        self.add_scalar("ARRAY_TO_STRING", scalar::array_to_string, String);
        self.add_scalar("ARRAY_REVERSE", scalar::array_reverse, Array);
        self.add_scalar("GENERATE_ARRAY", scalar::generate_array, Array);
        self.add_scalar("DECODE_ARRAY", scalar::decode_array, Json);
        self.add_scalar("DECODE_JSON_VALUE", scalar::decode_json_value, String);
        self.add_scalar("ABS", scalar::abs, Float);
        self.add_scalar("SIGN", scalar::sign, Int);
        self.add_scalar("SQRT", scalar::sqrt, Float);
        self.add_scalar("POW", scalar::pow, Float);
        self.add_scalar("EXP", scalar::exp, Float);
        self.add_scalar("LN", scalar::ln, Float);
        self.add_scalar("LOG", scalar::log, Float);
        self.add_scalar("LOG10", scalar::log10, Float);
        self.add_scalar("IEEE_DIVIDE", scalar::ieee_divide, Float);
        self.add_scalar("ROUND", scalar::round, Float);
        self.add_scalar("TRUNC", scalar::trunc, Float);
        self.add_scalar("CEIL", scalar::ceil, Float);
        self.add_scalar("FLOOR", scalar::floor, Float);
        self.add_scalar("COS", scalar::cos, Float);
        self.add_scalar("SIN", scalar::sin, Float);
        self.add_scalar("TAN", scalar::tan, Float);
        self.add_scalar("ACOS", scalar::acos, Float);
        self.add_scalar("ASIN", scalar::asin, Float);
        self.add_scalar("ATAN", scalar::atan, Float);
        self.add_scalar("ATAN2", scalar::atan2, Float);
        self.add_scalar("RANGE_BUCKET", scalar::range_bucket, Int);
        self.add_scalar("FARM_FINGERPRINT", scalar::farm_fingerprint, Int);
        self.add_scalar("MD5", scalar::md5, Bytes);
        self.add_scalar("SHA1", scalar::sha1, Bytes);
        self.add_scalar("SHA256", scalar::sha256, Bytes);
        self.add_scalar("SHA512", scalar::sha512, Bytes);
        self.add_scalar("TO_JSON", scalar::to_json, Json);
        self.add_scalar("JSON_TYPE", scalar::json_type, String);
        self.add_scalar("CAST", scalar::cast, String);
        self.add_scalar("GROUP_BY", scalar::group_by, String);
        self.add_scalar("MAKE_STRUCT", scalar::make_struct, Struct);
        self.add_scalar("STRUCT_FIELD", scalar::struct_field, String);
        #[cfg(feature = "js")]
        self.add_scalar("EVAL_JAVASCRIPT", crate::js::eval_javascript, String);

        self.add_scalar("SAFE_ADD", scalar::safe_add, Float);
        self.add_scalar("SAFE_SUB", scalar::safe_sub, Float);
        self.add_scalar("SAFE_MUL", scalar::safe_mul, Float);
        self.add_scalar("SAFE_MOD", scalar::safe_mod, Int);
        self.add_scalar("SAFE_DIV_INT", scalar::safe_div_int, Int);

        self.add_scalar("BITWISE_AND", scalar::bitwise_and, Int);
        self.add_scalar("BITWISE_OR", scalar::bitwise_or, Int);
        self.add_scalar("BITWISE_XOR", scalar::bitwise_xor, Int);
        self.add_scalar("BITWISE_NOT", scalar::bitwise_not, Int);
        self.add_scalar("BITWISE_LEFT_SHIFT", scalar::bitwise_left_shift, Int);
        self.add_scalar("BITWISE_RIGHT_SHIFT", scalar::bitwise_right_shift, Int);

        self.add_scalar("CASE_WITH_VALUE", scalar::case_with_value, String);
        self.add_scalar("CASE_NO_VALUE", scalar::case_no_value, String);

        self.add_volatile_scalar("RAND", scalar::rand, Float);
        self.add_scalar("FORMAT", scalar::format, String);

        self.add_scalar("NET.HOST", scalar::net_host, String);
        self.add_scalar("NET.IP_FROM_STRING", scalar::net_ip_from_string, Bytes);
        self.add_scalar("NET.SAFE_IP_FROM_STRING", scalar::net_safe_ip_from_string, Bytes);
        self.add_scalar("NET.IP_TO_STRING", scalar::net_ip_to_string, String);
        self.add_scalar("NET.IP_TRUNC", scalar::net_ip_trunc, Bytes);
        self.add_scalar("NET.IPV4_FROM_INT64", scalar::net_ipv4_from_int64, Bytes);
        self.add_scalar("NET.IPV4_TO_INT64", scalar::net_ipv4_to_int64, Int);
        self.add_scalar("NET.IP_NET_MASK", scalar::net_ip_net_mask, Bytes);
        self.add_scalar("NET.PUBLIC_SUFFIX", scalar::net_public_suffix, String);
        self.add_scalar("NET.REG_DOMAIN", scalar::net_reg_domain, String);

        self.add_volatile_scalar("CURRENT_DATE", scalar::current_date, Date);
        self.add_volatile_scalar("CURRENT_DATETIME", scalar::current_datetime, Datetime);
        self.add_volatile_scalar("CURRENT_TIME", scalar::current_time, Time);
        self.add_volatile_scalar("CURRENT_TIMESTAMP", scalar::current_timestamp, Timestamp);
        self.add_scalar("DATE", scalar::date, Date);
        self.add_scalar("DATETIME", scalar::datetime, Datetime);
        self.add_scalar("TIME", scalar::time, Time);
        self.add_scalar("TIMESTAMP", scalar::timestamp, Timestamp);
        self.add_scalar("DATE_ADD", scalar::date_add, Date);
        self.add_scalar("DATE_SUB", scalar::date_sub, Date);
        self.add_scalar("DATETIME_ADD", scalar::datetime_add, Datetime);
        self.add_scalar("DATETIME_SUB", scalar::datetime_sub, Datetime);
        self.add_scalar("TIME_ADD", scalar::time_add, Time);
        self.add_scalar("TIME_SUB", scalar::time_sub, Time);
        self.add_scalar("TIMESTAMP_ADD", scalar::timestamp_add, Timestamp);
        self.add_scalar("TIMESTAMP_SUB", scalar::timestamp_sub, Timestamp);
        self.add_scalar("DATE_DIFF", scalar::date_diff, Int);
        self.add_scalar("DATETIME_DIFF", scalar::datetime_diff, Int);
        self.add_scalar("TIME_DIFF", scalar::time_diff, Int);
        self.add_scalar("TIMESTAMP_DIFF", scalar::timestamp_diff, Int);
        self.add_scalar("DATE_TRUNC", scalar::date_trunc, Date);
        self.add_scalar("DATETIME_TRUNC", scalar::datetime_trunc, Datetime);
        self.add_scalar("TIMESTAMP_TRUNC", scalar::timestamp_trunc, Timestamp);
        self.add_scalar("PARSE_DATE", scalar::parse_date, Date);
        self.add_scalar("PARSE_DATETIME", scalar::parse_datetime, Datetime);
        self.add_scalar("PARSE_TIME", scalar::parse_time, Time);
        self.add_scalar("PARSE_TIMESTAMP", scalar::parse_timestamp, Timestamp);
        self.add_scalar("UNIX_SECONDS", scalar::unix_seconds, Int);
        self.add_scalar("UNIX_MILLIS", scalar::unix_millis, Int);
        self.add_scalar("UNIX_MICROS", scalar::unix_micros, Int);
        self.add_scalar("TIMESTAMP_SECONDS", scalar::timestamp_seconds, Timestamp);
        self.add_scalar("TIMESTAMP_MILLIS", scalar::timestamp_millis, Timestamp);
        self.add_scalar("TIMESTAMP_MICROS", scalar::timestamp_micros, Timestamp);
        self.add_scalar("EXTRACT", scalar::extract, Int);
        self.add_scalar("LAST_DAY", scalar::last_day, Date);
    }

    fn register_aggregates(&mut self) {
        use TypeTag::*;
        self.add_aggregate("SUM", || Box::new(aggregate::Sum::default()), Float);
        self.add_aggregate("AVG", || Box::new(aggregate::Avg::default()), Float);
        self.add_aggregate("COUNT", || Box::new(aggregate::Count::default()), Int);
        self.add_aggregate("COUNT_STAR", || Box::new(aggregate::CountStar::default()), Int);
        self.add_aggregate("COUNTIF", || Box::new(aggregate::CountIf::default()), Int);
        self.add_aggregate("MIN", || Box::new(aggregate::MinMax::min()), String);
        self.add_aggregate("MAX", || Box::new(aggregate::MinMax::max()), String);
        self.add_aggregate("STRING_AGG", || Box::new(aggregate::StringAgg::default()), String);
        self.add_aggregate("ARRAY_AGG", || Box::new(aggregate::ArrayAgg::default()), Array);
        self.add_aggregate("ARRAY", || Box::new(aggregate::ArrayAgg::default()), Array);
        self.add_aggregate(
            "ARRAY_CONCAT_AGG",
            || Box::new(aggregate::ArrayConcatAgg::default()),
            Array,
        );
        self.add_aggregate("LOGICAL_AND", || Box::new(aggregate::LogicalAnd::default()), Bool);
        self.add_aggregate("LOGICAL_OR", || Box::new(aggregate::LogicalOr::default()), Bool);
        self.add_aggregate("BIT_AND_AGG", || Box::new(aggregate::BitAgg::new(BitOp::And)), Int);
        self.add_aggregate("BIT_OR_AGG", || Box::new(aggregate::BitAgg::new(BitOp::Or)), Int);
        self.add_aggregate("BIT_XOR_AGG", || Box::new(aggregate::BitAgg::new(BitOp::Xor)), Int);
    }

    fn register_window_aggregates(&mut self) {
        // Window aggregates reuse the same aggregate bodies; the binding
        // layer (C3) wraps them with frame-buffer scanning instead of a
        // single running state.
        use TypeTag::*;
        self.add_window_aggregate("SUM", || Box::new(aggregate::Sum::default()), Float);
        self.add_window_aggregate("AVG", || Box::new(aggregate::Avg::default()), Float);
        self.add_window_aggregate("COUNT", || Box::new(aggregate::Count::default()), Int);
        self.add_window_aggregate("MIN", || Box::new(aggregate::MinMax::min()), String);
        self.add_window_aggregate("MAX", || Box::new(aggregate::MinMax::max()), String);
        self.add_window_aggregate("ROW_NUMBER", || Box::new(crate::window::RowNumberAgg::default()), Int);
        self.add_window_aggregate("RANK", || Box::new(crate::window::RankAgg::default()), Int);
        self.add_window_aggregate("DENSE_RANK", || Box::new(crate::window::DenseRankAgg::default()), Int);
        self.add_window_aggregate("LAG", || Box::new(crate::window::LagAgg::default()), String);
        self.add_window_aggregate("LAST_VALUE", || Box::new(crate::window::LastValueAgg::default()), String);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_scalar_case_insensitively() {
        let reg = FunctionRegistry::new();
        assert!(reg.scalar("add").is_some());
        assert!(reg.scalar("ADD").is_some());
        assert!(reg.scalar("not_a_function").is_none());
    }
}
