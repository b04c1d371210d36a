/// A git blob object — an opaque byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Blob content is stored verbatim; parsing is the identity.
    pub fn parse(content: &[u8]) -> Self {
        Self {
            data: content.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_identity() {
        let blob = Blob::parse(b"some\0binary\xffdata");
        assert_eq!(blob.data, b"some\0binary\xffdata");
        assert_eq!(blob.len(), 16);
        assert!(!blob.is_empty());
    }

    #[test]
    fn empty_blob() {
        assert!(Blob::parse(b"").is_empty());
    }
}
