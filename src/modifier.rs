//! Quantity modifier：逻辑量名 → 物理访问方式
//!
//! 每个逻辑量二选一：
//! - **Alias**  ：直接映射到一个 [`NativeAddress`]
//! - **Derived**：纯函数 + 有序依赖列表（原生地址或其他逻辑量），
//!   在整个分区的数组上求值
//!
//! 注册时不校验文件内容：同一份注册表可以声明比任何单个 catalog
//! 实例实际拥有的更多的候选量，校验推迟到首次取数。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use crate::accessor::NativeAddress;
use crate::array::Array;
use crate::common::{CatalogError, Result};

// ── Transform ─────────────────────────────────────────────────────────────────

type TransformFn = dyn Fn(&[Array]) -> std::result::Result<Array, String> + Send + Sync;

/// 派生量的变换函数：输入为按依赖顺序解析出的数组
#[derive(Clone)]
pub struct Transform {
    label: String,
    func:  Arc<TransformFn>,
}

impl Transform {
    pub fn new<F>(label: &str, func: F) -> Self
    where
        F: Fn(&[Array]) -> std::result::Result<Array, String> + Send + Sync + 'static,
    {
        Self { label: label.into(), func: Arc::new(func) }
    }

    /// 单输入，逐元素 `value != 0`
    pub fn to_bool() -> Self {
        Self::new("to_bool", |inputs| match inputs {
            [x] => Ok(x.to_bool()),
            _   => Err(format!("to_bool expects 1 input, got {}", inputs.len())),
        })
    }

    /// 单输入，逐元素 f64 映射
    pub fn map_f64(label: &str, f: fn(f64) -> f64) -> Self {
        Self::new(label, move |inputs| match inputs {
            [x] => Ok(Array::Float64(x.to_f64().into_iter().map(f).collect())),
            _   => Err(format!("expects 1 input, got {}", inputs.len())),
        })
    }

    /// 双输入，逐元素 f64 映射
    pub fn zip_f64(label: &str, f: fn(f64, f64) -> f64) -> Self {
        Self::new(label, move |inputs| match inputs {
            [a, b] if a.len() == b.len() => Ok(Array::Float64(
                a.to_f64().into_iter().zip(b.to_f64()).map(|(x, y)| f(x, y)).collect(),
            )),
            [a, b] => Err(format!("input lengths differ: {} vs {}", a.len(), b.len())),
            _      => Err(format!("expects 2 inputs, got {}", inputs.len())),
        })
    }

    pub fn label(&self) -> &str { &self.label }

    pub fn apply(&self, inputs: &[Array]) -> std::result::Result<Array, String> {
        (self.func)(inputs)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({})", self.label)
    }
}

// ── QuantityModifier ──────────────────────────────────────────────────────────

/// 派生量的一个依赖
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Native(NativeAddress),
    Logical(String),
}

impl From<NativeAddress> for Dependency {
    fn from(a: NativeAddress) -> Self { Self::Native(a) }
}

impl From<&str> for Dependency {
    fn from(name: &str) -> Self { Self::Logical(name.into()) }
}

#[derive(Debug, Clone)]
pub enum QuantityModifier {
    Alias(NativeAddress),
    Derived { transform: Transform, dependencies: Vec<Dependency> },
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// 构造 catalog 时一次性建好，之后只读
#[derive(Debug, Clone, Default)]
pub struct QuantityModifierRegistry {
    entries: BTreeMap<String, QuantityModifier>,
}

impl QuantityModifierRegistry {
    pub fn new() -> Self { Self::default() }

    /// 注册或覆盖一个逻辑量
    pub fn register(&mut self, name: &str, modifier: QuantityModifier) -> &mut Self {
        self.entries.insert(name.into(), modifier);
        self
    }

    pub fn alias(&mut self, name: &str, address: NativeAddress) -> &mut Self {
        self.register(name, QuantityModifier::Alias(address))
    }

    pub fn derive(
        &mut self,
        name:         &str,
        transform:    Transform,
        dependencies: Vec<Dependency>,
    ) -> &mut Self {
        self.register(name, QuantityModifier::Derived { transform, dependencies })
    }

    pub fn resolve_spec(&self, name: &str) -> Result<&QuantityModifier> {
        self.entries.get(name)
            .ok_or_else(|| CatalogError::UnknownQuantity(name.into()))
    }

    pub fn contains(&self, name: &str) -> bool { self.entries.contains_key(name) }

    /// 已注册的逻辑量名（有序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
