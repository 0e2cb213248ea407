//! `months_covered(check_in, check_out)`: the first day of every calendar
//! month a stay touches, as a list of dates. Unnested in SQL to turn one
//! booking into one row per month.

use chrono::{Datelike, Months, NaiveDate};
use datafusion::arrow::array::{Array, AsArray, Date32Builder, ListBuilder};
use datafusion::arrow::datatypes::{DataType, Date32Type, Field};
use datafusion::error::Result as DataFusionResult;
use datafusion::logical_expr::{
    ColumnarValue, ScalarFunctionArgs, ScalarUDF, ScalarUDFImpl, Signature, Volatility,
};
use datafusion::prelude::SessionContext;
use std::any::Any;
use std::sync::Arc;

pub const MONTHS_COVERED: &str = "months_covered";

/// First-of-month dates from the month of `start` to the month of `end`,
/// inclusive. Empty when `start` is after `end`.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }

    let (Some(mut month), Some(last)) = (start.with_day(1), end.with_day(1)) else {
        return Vec::new();
    };

    let mut months = Vec::new();
    while month <= last {
        months.push(month);
        match month.checked_add_months(Months::new(1)) {
            Some(next) => month = next,
            None => break,
        }
    }
    months
}

#[derive(Debug)]
pub struct MonthsCovered {
    signature: Signature,
}

impl MonthsCovered {
    pub fn new() -> Self {
        Self {
            signature: Signature::exact(
                vec![DataType::Date32, DataType::Date32],
                Volatility::Immutable,
            ),
        }
    }

    fn item_field() -> Arc<Field> {
        Arc::new(Field::new_list_field(DataType::Date32, true))
    }
}

impl Default for MonthsCovered {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarUDFImpl for MonthsCovered {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        MONTHS_COVERED
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> DataFusionResult<DataType> {
        Ok(DataType::List(Self::item_field()))
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> DataFusionResult<ColumnarValue> {
        let arrays = ColumnarValue::values_to_arrays(&args.args)?;
        let check_in = arrays[0].as_primitive::<Date32Type>();
        let check_out = arrays[1].as_primitive::<Date32Type>();

        let mut builder = ListBuilder::new(Date32Builder::with_capacity(check_in.len()))
            .with_field(Self::item_field());

        for row in 0..check_in.len() {
            // Null dates cover no months.
            if check_in.is_valid(row) && check_out.is_valid(row) {
                if let (Some(start), Some(end)) =
                    (check_in.value_as_date(row), check_out.value_as_date(row))
                {
                    for month in months_between(start, end) {
                        builder
                            .values()
                            .append_value(Date32Type::from_naive_date(month));
                    }
                }
            }
            builder.append(true);
        }

        Ok(ColumnarValue::Array(Arc::new(builder.finish())))
    }
}

pub fn register(ctx: &SessionContext) {
    ctx.register_udf(ScalarUDF::from(MonthsCovered::new()));
}
