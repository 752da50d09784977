use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cursor::ByteCursor;
use crate::decoder::BlockDecoder;
use crate::error::{DecodeError, DecodeResult};
use crate::models::Block;

/// Something that can hand over the full contents of one block file.
pub trait BlockSource {
    fn label(&self) -> String;
    fn load(self) -> DecodeResult<Vec<u8>>;
}

impl BlockSource for Vec<u8> {
    fn label(&self) -> String {
        format!("<memory: {} bytes>", self.len())
    }

    fn load(self) -> DecodeResult<Vec<u8>> {
        Ok(self)
    }
}

impl BlockSource for PathBuf {
    fn label(&self) -> String {
        self.display().to_string()
    }

    fn load(self) -> DecodeResult<Vec<u8>> {
        Ok(std::fs::read(&self)?)
    }
}

/// The `blk*.dat` files of a blocks directory, in file name order.
pub struct FileReader {
    path: PathBuf,
    pub file_paths: Vec<PathBuf>,
}

impl FileReader {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let mut file_reader = Self {
            path: path.into(),
            file_paths: Vec::new(),
        };
        file_reader.index_files()?;
        Ok(file_reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn index_files(&mut self) -> io::Result<()> {
        let mut paths: Vec<_> = std::fs::read_dir(&self.path)?.collect::<Result<Vec<_>, io::Error>>()?;
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        self.file_paths = paths
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_block_file(path))
            .collect();

        debug!(dir = %self.path.display(), files = self.file_paths.len(), "indexed block files");
        Ok(())
    }

    pub fn blocks(&self, decoder: BlockDecoder) -> BlockStream<std::vec::IntoIter<PathBuf>> {
        BlockStream::new(self.file_paths.clone(), decoder)
    }
}

pub fn is_block_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with("blk"));
    name_ok && path.extension().map_or(false, |ext| ext == "dat")
}

struct LoadedSource {
    data: Vec<u8>,
    position: usize,
}

/// Lazy, finite sequence of blocks across sources taken in order.
///
/// A source is loaded only when the previous one is exhausted. After a
/// decode error the rest of that source is abandoned and the next call moves
/// on to the following source; stop iterating to halt instead.
pub struct BlockStream<I> {
    decoder: BlockDecoder,
    sources: I,
    current: Option<LoadedSource>,
    current_label: Option<String>,
}

impl<I, S> BlockStream<I>
where
    I: Iterator<Item = S>,
    S: BlockSource,
{
    pub fn new(sources: impl IntoIterator<IntoIter = I>, decoder: BlockDecoder) -> Self {
        Self {
            decoder,
            sources: sources.into_iter(),
            current: None,
            current_label: None,
        }
    }

    /// Label of the source the last item came from.
    pub fn current_source(&self) -> Option<&str> {
        self.current_label.as_deref()
    }
}

impl<I, S> Iterator for BlockStream<I>
where
    I: Iterator<Item = S>,
    S: BlockSource,
{
    type Item = DecodeResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let next = self.sources.next()?;
                let label = next.label();
                self.current_label = Some(label.clone());
                match next.load() {
                    Ok(data) => {
                        debug!(source = %label, bytes = data.len(), "loaded source");
                        self.current = Some(LoadedSource { data, position: 0 });
                    }
                    Err(e) => {
                        warn!(source = %label, error = %e, "failed to load source");
                        return Some(Err(e));
                    }
                }
            }
            let Some(source) = self.current.as_mut() else {
                continue;
            };

            let mut cursor = match ByteCursor::at(&source.data, source.position) {
                Ok(cursor) => cursor,
                Err(e) => {
                    self.current = None;
                    return Some(Err(e));
                }
            };
            match self.decoder.decode_block(&mut cursor) {
                Ok(block) => {
                    source.position = cursor.position();
                    return Some(Ok(block));
                }
                Err(DecodeError::EndOfStream) => {
                    self.current = None;
                }
                Err(e) => {
                    self.current = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Decodes every source in order with the default decoder.
pub fn decode_all<I>(sources: I) -> BlockStream<I::IntoIter>
where
    I: IntoIterator,
    I::Item: BlockSource,
{
    BlockStream::new(sources, BlockDecoder::default())
}
