//! Asset loading: fetching bytes, decoding them and streaming completions.
//!
//! The scene describes everything it needs as [`LoadTask`]s. Each task is turned
//! into a stream of [`Completion`]s which the engine drives in the background
//! while the render loop keeps running. A [`LoadTask::Chain`] loads its assets
//! one after another so that later assets can depend on earlier ones.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use anyhow::Context as _;
use futures::Stream;

pub mod animation;
pub mod gltf_asset;
pub mod loading;
pub mod mesh;
pub mod obj_asset;
pub mod texture;

use mesh::MeshAsset;
use texture::ImageData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Mesh,
    Texture,
    Audio,
}

/// Encoded audio file contents. Decoding to samples is up to the audio output.
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AudioBuffer({}, {} bytes)", self.name, self.bytes.len())
    }
}

/// A decoded resource, typed by its [`AssetKind`].
#[derive(Debug)]
pub enum Loaded {
    Mesh(MeshAsset),
    Texture(ImageData),
    Audio(AudioBuffer),
}

impl Loaded {
    pub fn kind(&self) -> AssetKind {
        match self {
            Loaded::Mesh(_) => AssetKind::Mesh,
            Loaded::Texture(_) => AssetKind::Texture,
            Loaded::Audio(_) => AssetKind::Audio,
        }
    }
}

/// Where asset bytes come from.
#[derive(Clone, Debug)]
pub enum AssetSource {
    /// Files below a directory.
    #[cfg(not(target_arch = "wasm32"))]
    Directory(std::path::PathBuf),
    /// Files served from memory, keyed by url.
    Memory(Arc<HashMap<String, Vec<u8>>>),
    /// Files below a base url.
    #[cfg(target_arch = "wasm32")]
    Http(reqwest::Url),
}

impl AssetSource {
    /// The default source for an asset root: a directory natively and a path
    /// below the page origin on the web.
    pub fn from_root(root: &str) -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            Ok(Self::Directory(std::path::PathBuf::from(root)))
        }
        #[cfg(target_arch = "wasm32")]
        {
            let window = web_sys::window().context("no window")?;
            let origin = window
                .location()
                .origin()
                .map_err(|_| anyhow::anyhow!("page has no origin"))?;
            let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))?;
            Ok(Self::Http(base))
        }
    }

    pub fn memory<K: Into<String>>(files: impl IntoIterator<Item = (K, Vec<u8>)>) -> Self {
        Self::Memory(Arc::new(
            files.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        match self {
            #[cfg(not(target_arch = "wasm32"))]
            Self::Directory(root) => {
                let path = root.join(url);
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))
            }
            Self::Memory(files) => files
                .get(url)
                .cloned()
                .with_context(|| format!("{url} not found")),
            #[cfg(target_arch = "wasm32")]
            Self::Http(base) => {
                let url = base.join(url)?;
                let response = reqwest::get(url.clone()).await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

/// A single asset request and what it becomes once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadableAsset<T> {
    pub url: String,
    pub kind: AssetKind,
    pub target: T,
}

impl<T> LoadableAsset<T> {
    pub fn new(url: impl Into<String>, kind: AssetKind, target: T) -> Self {
        Self {
            url: url.into(),
            kind,
            target,
        }
    }
}

/// The outcome of one asset request.
#[derive(Debug)]
pub struct Completion<T> {
    pub url: String,
    pub target: T,
    pub result: anyhow::Result<Loaded>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadTask<T> {
    Single(LoadableAsset<T>),
    /// Loads in order and stops at the first failure. Assets after a failure
    /// complete with an error without being fetched.
    Chain(Vec<LoadableAsset<T>>),
}

impl<T> LoadTask<T> {
    pub fn assets(&self) -> &[LoadableAsset<T>] {
        match self {
            LoadTask::Single(asset) => std::slice::from_ref(asset),
            LoadTask::Chain(assets) => assets,
        }
    }

    /// Turns the task into a stream yielding one completion per asset.
    pub fn into_stream(self, source: AssetSource) -> impl Stream<Item = Completion<T>> {
        let queue: VecDeque<LoadableAsset<T>> = match self {
            LoadTask::Single(asset) => VecDeque::from([asset]),
            LoadTask::Chain(assets) => assets.into(),
        };
        futures::stream::unfold(
            (queue, source, None::<String>),
            |(mut queue, source, failed)| async move {
                let asset = queue.pop_front()?;
                let completion = match &failed {
                    Some(previous) => Completion {
                        result: Err(anyhow::anyhow!("skipped because {previous} failed")),
                        url: asset.url,
                        target: asset.target,
                    },
                    None => load(&source, asset).await,
                };
                let failed = failed.or_else(|| {
                    completion
                        .result
                        .is_err()
                        .then(|| completion.url.clone())
                });
                Some((completion, (queue, source, failed)))
            },
        )
    }
}

/// Fetches and decodes one asset.
pub async fn load<T>(source: &AssetSource, asset: LoadableAsset<T>) -> Completion<T> {
    log::debug!("loading {}", asset.url);
    let result = fetch_and_decode(source, &asset.url, asset.kind).await;
    Completion {
        url: asset.url,
        target: asset.target,
        result,
    }
}

async fn fetch_and_decode(
    source: &AssetSource,
    url: &str,
    kind: AssetKind,
) -> anyhow::Result<Loaded> {
    let bytes = source.fetch(url).await?;
    let ext = texture::extension(url);
    match kind {
        AssetKind::Mesh => match ext.as_deref() {
            Some("gltf" | "glb") => Ok(Loaded::Mesh(gltf_asset::decode(source, url, &bytes).await?)),
            Some("obj") => Ok(Loaded::Mesh(obj_asset::decode(url, &bytes).await?)),
            other => anyhow::bail!("unsupported mesh format {:?} for {url}", other),
        },
        AssetKind::Texture => Ok(Loaded::Texture(ImageData::decode(
            &bytes,
            url,
            ext.as_deref(),
        )?)),
        AssetKind::Audio => {
            anyhow::ensure!(!bytes.is_empty(), "{url} is empty");
            Ok(Loaded::Audio(AudioBuffer {
                name: url.to_string(),
                bytes: bytes.into(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, executor::block_on};

    use super::*;

    fn chain(urls: &[&str]) -> LoadTask<usize> {
        LoadTask::Chain(
            urls.iter()
                .enumerate()
                .map(|(idx, url)| LoadableAsset::new(*url, AssetKind::Audio, idx))
                .collect(),
        )
    }

    #[test]
    fn chain_completes_in_order() {
        let source = AssetSource::memory([("a.mp3", vec![1]), ("b.mp3", vec![2])]);
        let completions: Vec<_> = block_on(chain(&["a.mp3", "b.mp3"]).into_stream(source).collect());
        let targets: Vec<_> = completions.iter().map(|c| c.target).collect();
        assert_eq!(targets, vec![0, 1]);
        assert!(completions.iter().all(|c| c.result.is_ok()));
    }

    #[test]
    fn chain_skips_everything_after_a_failure() {
        let source = AssetSource::memory([("a.mp3", vec![1]), ("c.mp3", vec![3])]);
        let completions: Vec<_> =
            block_on(chain(&["a.mp3", "missing.mp3", "c.mp3"]).into_stream(source).collect());
        assert_eq!(completions.len(), 3);
        assert!(completions[0].result.is_ok());
        assert!(completions[1].result.is_err());
        let skipped = completions[2].result.as_ref().expect_err("c.mp3 must be skipped");
        assert!(skipped.to_string().contains("missing.mp3"));
    }

    #[test]
    fn unknown_mesh_formats_fail_with_the_url() {
        let source = AssetSource::memory([("woman/Clap.fbx", vec![0u8; 4])]);
        let asset = LoadableAsset::new("woman/Clap.fbx", AssetKind::Mesh, ());
        let completion = block_on(load(&source, asset));
        let err = completion.result.expect_err("fbx is not supported");
        assert!(err.to_string().contains("woman/Clap.fbx"));
    }
}
