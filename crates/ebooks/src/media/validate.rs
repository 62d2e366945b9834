use super::MediaError;

/// Extensions accepted for uploaded audio artifacts.
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav"];

/// Classify a filename by extension allow-list.
///
/// The comparison is case-insensitive and looks only at the filename suffix;
/// no content sniffing is done. A filename that is nothing but the suffix has
/// no base name and is rejected. The rejection message enumerates the allowed
/// extensions for the client.
pub fn validate_extension(filename: &str, allowed: &[&str]) -> Result<(), MediaError> {
    let lower = filename.to_ascii_lowercase();
    if allowed
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
    {
        Ok(())
    } else {
        Err(MediaError::UnsupportedExtension {
            allowed: allowed.join(", "),
        })
    }
}

/// Validate an audio upload filename against the audio allow-list.
pub fn validate_audio_filename(filename: &str) -> Result<(), MediaError> {
    validate_extension(filename, AUDIO_EXTENSIONS)
}
