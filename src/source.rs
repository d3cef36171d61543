//! 道路数据来源的接口，以及一个基于内存的实现。

use geo::Geometry;

use crate::{FieldError, Result};

/// 图层信息：序号、名称、要素数量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub index: usize,
    pub name: String,
    pub feature_count: usize,
}

/// 按道路等级（要素的 `fclass` 属性）过滤
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoadClass {
    /// 不过滤
    #[default]
    All,
    /// 只保留等级在集合中的道路，例如 `primary`
    Only(Vec<String>),
}

impl RoadClass {
    /// 按命令行习惯解析：`all` 表示不过滤，否则是单个等级
    pub fn parse(value: &str) -> Self {
        if value == "all" {
            RoadClass::All
        } else {
            RoadClass::Only(vec![value.to_string()])
        }
    }

    /// 给定等级是否通过过滤
    pub fn accepts(&self, fclass: &str) -> bool {
        match self {
            RoadClass::All => true,
            RoadClass::Only(classes) => classes.iter().any(|class| class == fclass),
        }
    }
}

/// 道路几何的来源
pub trait GeometrySource {
    /// 列出所有图层
    fn list_layers(&self) -> Result<Vec<LayerInfo>>;

    /// 读取一个图层的几何，保持要素原有顺序
    fn load_geometries(&self, layer: usize, road_class: &RoadClass) -> Result<Vec<Geometry<f64>>>;
}

/// 带道路等级的要素
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub fclass: String,
    pub geometry: Geometry<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct Layer {
    name: String,
    features: Vec<Feature>,
}

/// 内存中的图层集合
///
/// # 示例
///
/// ```rust
/// # fn main() -> road_distance_field::Result<()> {
/// use geo::LineString;
/// use road_distance_field::{GeometrySource, MemorySource, RoadClass};
///
/// let mut source = MemorySource::new();
/// source.add_layer(
///     "roads",
///     vec![
///         ("primary", LineString::from(vec![(0., 0.), (1., 1.)]).into()),
///         ("footway", LineString::from(vec![(0., 1.), (1., 0.)]).into()),
///     ],
/// );
/// let primary = source.load_geometries(0, &RoadClass::parse("primary"))?;
/// assert_eq!(primary.len(), 1);
/// # Ok(())}
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    layers: Vec<Layer>,
}

impl MemorySource {
    /// 创建一个空的数据源
    pub fn new() -> Self {
        MemorySource::default()
    }

    /// 追加一个图层，返回它的序号
    pub fn add_layer<S, I>(&mut self, name: &str, features: I) -> usize
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Geometry<f64>)>,
    {
        let features = features
            .into_iter()
            .map(|(fclass, geometry)| Feature {
                fclass: fclass.into(),
                geometry,
            })
            .collect();
        self.layers.push(Layer {
            name: name.to_string(),
            features,
        });
        self.layers.len() - 1
    }
}

impl GeometrySource for MemorySource {
    fn list_layers(&self) -> Result<Vec<LayerInfo>> {
        Ok(self
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerInfo {
                index,
                name: layer.name.clone(),
                feature_count: layer.features.len(),
            })
            .collect())
    }

    fn load_geometries(&self, layer: usize, road_class: &RoadClass) -> Result<Vec<Geometry<f64>>> {
        let layer = self
            .layers
            .get(layer)
            .ok_or(FieldError::MissingLayer(layer))?;
        Ok(layer
            .features
            .iter()
            .filter(|feature| road_class.accepts(&feature.fclass))
            .map(|feature| feature.geometry.clone())
            .collect())
    }
}
