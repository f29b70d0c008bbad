/// Low-level helpers for reading and writing the little-endian primitives shared by every format
pub mod data;
/// Error definitions
pub mod error;
/// High-level export: options, the texture table policy and the export entry point
pub mod export;
/// The abstract scene graph (nodes, meshes, materials, textures) handed to the exporter
pub mod models;
/// The mu model format: tag vocabulary, shader layouts, writer and reader
pub mod mu;
/// Prop config files and the placeholder proxies they declare.
pub mod props;
/// Generic wrapper for values that may or may not match a known variant.
pub mod recognized;
/// Image codecs (TGA, MBM, PNG) and normal-map generation
pub mod textures;

#[cfg(feature = "arc")]
pub type Rc<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub type Rc<T> = std::rc::Rc<T>;
