//! Files attached to a turn, and the transient references that carry image
//! bytes to the model for the duration of one turn.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use base64::Engine;

use crate::error::{Error, Result};
use crate::types::InlineData;

/// Prefix of every transient reference.
pub const TRANSIENT_REF_PREFIX: &str = "blob:lexa/";

/// Supported image media types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMediaType {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `image/gif`
    Gif,
    /// `image/webp`
    Webp,
    /// `image/heic`
    Heic,
    /// `image/heif`
    Heif,
}

impl ImageMediaType {
    /// The IANA media type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Gif => "image/gif",
            ImageMediaType::Webp => "image/webp",
            ImageMediaType::Heic => "image/heic",
            ImageMediaType::Heif => "image/heif",
        }
    }
}

/// Supported document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    /// PDF
    Pdf,
    /// Legacy Word document
    Doc,
    /// Word document
    Docx,
    /// Plain text
    Txt,
}

/// What an attachment is, as far as the client cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// Sent inline to the model.
    Image(ImageMediaType),
    /// Only the name is mentioned to the model.
    Document(DocumentType),
}

impl AttachmentKind {
    /// Classify a file by its extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let kind = match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => AttachmentKind::Image(ImageMediaType::Jpeg),
            "png" => AttachmentKind::Image(ImageMediaType::Png),
            "gif" => AttachmentKind::Image(ImageMediaType::Gif),
            "webp" => AttachmentKind::Image(ImageMediaType::Webp),
            "heic" => AttachmentKind::Image(ImageMediaType::Heic),
            "heif" => AttachmentKind::Image(ImageMediaType::Heif),
            "pdf" => AttachmentKind::Document(DocumentType::Pdf),
            "doc" => AttachmentKind::Document(DocumentType::Doc),
            "docx" => AttachmentKind::Document(DocumentType::Docx),
            "txt" => AttachmentKind::Document(DocumentType::Txt),
            _ => return None,
        };
        Some(kind)
    }
}

/// A file waiting to be sent with the next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    path: PathBuf,
    name: String,
    kind: AttachmentKind,
}

impl Attachment {
    /// Create an attachment from a file on disk.
    ///
    /// The file must exist and have one of the supported image or document
    /// extensions.  Its contents are not read until the turn is composed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::validation(
                    format!("{} is not a file name", path.display()),
                    Some("attachments".to_string()),
                )
            })?
            .to_string();
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(AttachmentKind::from_extension)
            .ok_or_else(|| {
                Error::validation(
                    format!("{name}: unsupported file type (images, pdf, doc, docx, txt)"),
                    Some("attachments".to_string()),
                )
            })?;
        let metadata = fs::metadata(path)
            .map_err(|err| Error::io(format!("cannot attach {}", path.display()), err))?;
        if !metadata.is_file() {
            return Err(Error::validation(
                format!("{name} is not a regular file"),
                Some("attachments".to_string()),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            name,
            kind,
        })
    }

    /// The file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file's name, without directories.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attachment's kind.
    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// True for images.
    pub fn is_image(&self) -> bool {
        matches!(self.kind, AttachmentKind::Image(_))
    }

    /// The durable reference recorded on the conversation entry.
    pub fn reference(&self) -> String {
        self.path.display().to_string()
    }

    /// Read an image attachment into base64 inline data.
    pub fn read_inline(&self) -> Result<InlineData> {
        let AttachmentKind::Image(media_type) = self.kind else {
            return Err(Error::validation(
                format!("{} is not an image", self.name),
                Some("attachments".to_string()),
            ));
        };
        let bytes = fs::read(&self.path)
            .map_err(|err| Error::io(format!("failed to read {}", self.path.display()), err))?;
        Ok(InlineData {
            mime_type: media_type.mime_type().to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AttachmentKind::Image(media_type) => {
                write!(f, "{} ({})", self.name, media_type.mime_type())
            }
            AttachmentKind::Document(_) => write!(f, "{} (document)", self.name),
        }
    }
}

/// The note appended to a prompt naming the attached documents.
///
/// Returns an empty string when there are none.  Document contents are never
/// sent; the model only learns the names.
pub fn document_note(attachments: &[Attachment]) -> String {
    let names: Vec<&str> = attachments
        .iter()
        .filter(|attachment| !attachment.is_image())
        .map(Attachment::name)
        .collect();
    if names.is_empty() {
        return String::new();
    }
    format!(
        "\n\nI have uploaded the following documents: {}. Please consider their content when responding.",
        names.join(", ")
    )
}

////////////////////////////////////// TransientRefs ///////////////////////////////////////

#[derive(Debug, Default)]
struct RefTable {
    next: u64,
    live: HashMap<String, InlineData>,
}

/// A registry of revocable references to inline image data.
///
/// References are handed out through a [`RefLease`]; dropping the lease
/// revokes every reference it registered.
#[derive(Debug, Clone, Default)]
pub struct TransientRefs {
    table: Arc<Mutex<RefTable>>,
}

impl TransientRefs {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a lease whose references are revoked when it is dropped.
    pub fn lease(&self) -> RefLease {
        RefLease {
            refs: self.clone(),
            registered: Vec::new(),
        }
    }

    /// Look up a live reference.
    pub fn resolve(&self, reference: &str) -> Option<InlineData> {
        self.lock().live.get(reference).cloned()
    }

    /// The number of references not yet revoked.
    pub fn live(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> MutexGuard<'_, RefTable> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// References registered for one turn.
#[derive(Debug)]
pub struct RefLease {
    refs: TransientRefs,
    registered: Vec<String>,
}

impl RefLease {
    /// Register inline data and return its reference.
    pub fn register(&mut self, data: InlineData) -> String {
        let mut table = self.refs.lock();
        table.next += 1;
        let reference = format!("{TRANSIENT_REF_PREFIX}{}", table.next);
        table.live.insert(reference.clone(), data);
        self.registered.push(reference.clone());
        reference
    }

    /// The references registered so far, in order.
    pub fn references(&self) -> &[String] {
        &self.registered
    }

    /// Revoke every reference registered through this lease.
    pub fn revoke_all(&mut self) {
        if self.registered.is_empty() {
            return;
        }
        let mut table = self.refs.lock();
        for reference in self.registered.drain(..) {
            table.live.remove(&reference);
        }
    }
}

impl Drop for RefLease {
    fn drop(&mut self) {
        self.revoke_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn classification() {
        assert_eq!(
            AttachmentKind::from_extension("JPG"),
            Some(AttachmentKind::Image(ImageMediaType::Jpeg))
        );
        assert_eq!(
            AttachmentKind::from_extension("docx"),
            Some(AttachmentKind::Document(DocumentType::Docx))
        );
        assert_eq!(AttachmentKind::from_extension("exe"), None);
    }

    #[test]
    fn from_path_checks_type_and_existence() {
        let dir = tempfile::tempdir().unwrap();
        let png = write(dir.path(), "cat.png", b"png");
        let attachment = Attachment::from_path(&png).unwrap();
        assert_eq!(attachment.name(), "cat.png");
        assert!(attachment.is_image());
        assert_eq!(attachment.to_string(), "cat.png (image/png)");

        let exe = write(dir.path(), "tool.exe", b"MZ");
        assert!(Attachment::from_path(exe).unwrap_err().is_validation());
        assert!(
            Attachment::from_path(dir.path().join("missing.pdf"))
                .unwrap_err()
                .is_persistence()
        );
    }

    #[test]
    fn read_inline_encodes_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "hello.gif", b"hello");
        let inline = Attachment::from_path(path).unwrap().read_inline().unwrap();
        assert_eq!(inline.mime_type, "image/gif");
        assert_eq!(inline.data, "aGVsbG8=");

        let doc = write(dir.path(), "notes.txt", b"secret");
        assert!(Attachment::from_path(doc).unwrap().read_inline().is_err());
    }

    #[test]
    fn document_note_names_only_documents() {
        let dir = tempfile::tempdir().unwrap();
        let attachments = vec![
            Attachment::from_path(write(dir.path(), "a.pdf", b"%PDF")).unwrap(),
            Attachment::from_path(write(dir.path(), "b.png", b"png")).unwrap(),
            Attachment::from_path(write(dir.path(), "c.txt", b"text")).unwrap(),
        ];
        assert_eq!(
            document_note(&attachments),
            "\n\nI have uploaded the following documents: a.pdf, c.txt. Please consider their content when responding."
        );
        assert_eq!(document_note(&attachments[1..2]), "");
    }

    #[test]
    fn lease_revokes_on_drop() {
        let refs = TransientRefs::new();
        let data = InlineData {
            mime_type: "image/png".to_string(),
            data: "AA==".to_string(),
        };
        let first;
        {
            let mut lease = refs.lease();
            first = lease.register(data.clone());
            let second = lease.register(data.clone());
            assert_ne!(first, second);
            assert!(first.starts_with(TRANSIENT_REF_PREFIX));
            assert_eq!(refs.live(), 2);
            assert_eq!(refs.resolve(&first), Some(data.clone()));
        }
        assert_eq!(refs.live(), 0);
        assert_eq!(refs.resolve(&first), None);
    }

    #[test]
    fn leases_are_independent() {
        let refs = TransientRefs::new();
        let data = InlineData {
            mime_type: "image/png".to_string(),
            data: "AA==".to_string(),
        };
        let mut outer = refs.lease();
        let kept = outer.register(data.clone());
        let mut inner = refs.lease();
        inner.register(data);
        inner.revoke_all();
        assert_eq!(refs.live(), 1);
        assert!(refs.resolve(&kept).is_some());
        drop(outer);
        assert_eq!(refs.live(), 0);
    }
}
