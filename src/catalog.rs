//! 构建器可用的表：可选字段与数据行

use crate::ast::AggregateFunc;
use crate::executor::ExecutorConfig;
use crate::model::{Dimension, FieldType, Metric};
use crate::value::{row, Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 一张可选择的表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// 构建器提供的全部选项，以及适用于其数据的旧字段别名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub tables: Vec<TableDefinition>,
    #[serde(default = "default_aggregations")]
    pub aggregations: Vec<AggregateFunc>,
    #[serde(default)]
    pub field_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

fn default_aggregations() -> Vec<AggregateFunc> {
    vec![
        AggregateFunc::Sum,
        AggregateFunc::Avg,
        AggregateFunc::Count,
        AggregateFunc::Min,
        AggregateFunc::Max,
    ]
}

impl Catalog {
    /// 不区分大小写查找表
    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|table| table.name.as_str())
    }

    /// 所有表的数据行，以小写表名为键
    pub fn dataset(&self) -> Dataset {
        let mut dataset = Dataset::new();
        for table in &self.tables {
            dataset.insert(&table.name, table.rows.clone());
        }
        dataset
    }

    /// 构建器自带的示例目录
    pub fn builtin() -> Self {
        Self {
            tables: vec![sales_table(), inventory_table(), customers_table()],
            aggregations: default_aggregations(),
            field_aliases: BTreeMap::from([("sales".to_string(), "revenue".to_string())]),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// 以小写表名为键的数据行集合，构建后只读
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    tables: HashMap<String, Vec<Row>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: &str, rows: Vec<Row>) {
        self.tables.insert(table.to_lowercase(), rows);
    }

    pub fn table(&self, name: &str) -> Option<&[Row]> {
        self.tables.get(&name.to_lowercase()).map(Vec::as_slice)
    }
}

fn sales_table() -> TableDefinition {
    let rows = [
        (1, "Apr", "Product B", "East", 8783.0, 189.0, 47, 0.05),
        (2, "Jun", "Product C", "South", 367.0, 3074.0, 2, 0.10),
        (3, "Sep", "Product B", "South", 7485.0, 496.0, 18, 0.00),
        (4, "Apr", "Product A", "North", 8675.0, 4825.0, 58, 0.15),
        (5, "Sep", "Product C", "North", 3342.0, 3550.0, 91, 0.05),
        (6, "Jun", "Product A", "West", 7607.0, 2198.0, 45, 0.00),
        (7, "Jun", "Product B", "North", 8457.0, 550.0, 94, 0.20),
        (8, "Dec", "Product C", "North", 9962.0, 4594.0, 63, 0.10),
        (9, "Dec", "Product A", "East", 5120.0, 1310.0, 36, 0.05),
        (10, "Mar", "Product B", "West", 2290.0, 720.0, 12, 0.00),
        (11, "Mar", "Product A", "South", 6431.0, 2875.0, 51, 0.10),
        (12, "Sep", "Product C", "East", 4718.0, 1602.0, 29, 0.15),
    ]
    .into_iter()
    .map(|(id, month, product, region, revenue, profit, quantity, discount)| {
        row([
            ("id", Value::from(id)),
            ("month", Value::from(month)),
            ("product", Value::from(product)),
            ("region", Value::from(region)),
            ("category", Value::from(category_of(product))),
            ("revenue", Value::from(revenue)),
            ("profit", Value::from(profit)),
            ("quantity", Value::from(quantity)),
            ("discount", Value::from(discount)),
        ])
    })
    .collect();

    TableDefinition {
        name: "sales".to_string(),
        label: "Sales".to_string(),
        metrics: vec![
            Metric::new("revenue", "Revenue", FieldType::Currency),
            Metric::new("profit", "Profit", FieldType::Currency),
            Metric::new("quantity", "Quantity", FieldType::Number),
            Metric::new("discount", "Discount", FieldType::Percentage),
        ],
        dimensions: vec![
            Dimension::new("product", "Product"),
            Dimension::new("region", "Region"),
            Dimension::new("month", "Month"),
            Dimension::new("category", "Category"),
        ],
        rows,
    }
}

fn category_of(product: &str) -> &'static str {
    match product {
        "Product A" => "Hardware",
        "Product B" => "Software",
        _ => "Services",
    }
}

fn inventory_table() -> TableDefinition {
    let rows = [
        (1, "Product A", "Warehouse 1", "Hardware", 120, 15, 24.5),
        (2, "Product B", "Warehouse 1", "Software", 340, 40, 12.0),
        (3, "Product C", "Warehouse 2", "Services", 75, 10, 48.25),
        (4, "Product A", "Warehouse 2", "Hardware", 18, 15, 24.5),
        (5, "Product B", "Warehouse 3", "Software", 260, 40, 12.0),
        (6, "Product C", "Warehouse 3", "Services", 5, 10, 48.25),
    ]
    .into_iter()
    .map(|(id, product, warehouse, category, stock, reorder_level, unit_cost)| {
        row([
            ("id", Value::from(id)),
            ("product", Value::from(product)),
            ("warehouse", Value::from(warehouse)),
            ("category", Value::from(category)),
            ("stock", Value::from(stock)),
            ("reorder_level", Value::from(reorder_level)),
            ("unit_cost", Value::from(unit_cost)),
        ])
    })
    .collect();

    TableDefinition {
        name: "inventory".to_string(),
        label: "Inventory".to_string(),
        metrics: vec![
            Metric::new("stock", "Stock", FieldType::Number),
            Metric::new("reorder_level", "Reorder Level", FieldType::Number),
            Metric::new("unit_cost", "Unit Cost", FieldType::Currency),
        ],
        dimensions: vec![
            Dimension::new("product", "Product"),
            Dimension::new("warehouse", "Warehouse"),
            Dimension::new("category", "Category"),
        ],
        rows,
    }
}

fn customers_table() -> TableDefinition {
    let rows = [
        (1, "Acme Corp", "East", "Enterprise", 12, 48200.0, 0.92),
        (2, "Globex", "West", "Enterprise", 8, 31750.0, 0.85),
        (3, "Initech", "North", "SMB", 21, 9400.0, 0.78),
        (4, "Umbrella", "South", "SMB", 5, 3100.0, 0.64),
        (5, "Hooli", "West", "Startup", 17, 12650.0, 0.88),
        (6, "Stark Industries", "East", "Enterprise", 30, 96300.0, 0.97),
    ]
    .into_iter()
    .map(|(id, name, region, segment, orders, lifetime_value, satisfaction)| {
        row([
            ("id", Value::from(id)),
            ("name", Value::from(name)),
            ("region", Value::from(region)),
            ("segment", Value::from(segment)),
            ("orders", Value::from(orders)),
            ("lifetime_value", Value::from(lifetime_value)),
            ("satisfaction", Value::from(satisfaction)),
        ])
    })
    .collect();

    TableDefinition {
        name: "customers".to_string(),
        label: "Customers".to_string(),
        metrics: vec![
            Metric::new("orders", "Orders", FieldType::Number),
            Metric::new("lifetime_value", "Lifetime Value", FieldType::Currency),
            Metric::new("satisfaction", "Satisfaction", FieldType::Percentage),
        ],
        dimensions: vec![
            Dimension::new("region", "Region"),
            Dimension::new("segment", "Segment"),
            Dimension::new("name", "Customer"),
        ],
        rows,
    }
}
