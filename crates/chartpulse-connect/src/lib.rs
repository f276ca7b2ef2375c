pub mod acrcloud;
pub mod error;
pub mod signing;
pub mod soundcharts;
pub mod spool;

pub use acrcloud::{
    FileScanClient, FileScanConfig, IdentifyClient, IdentifyConfig, MusicMatch, ScanFile,
    ScanResults,
};
pub use error::ConnectError;
pub use signing::{identify_signature, verify_webhook_signature};
pub use soundcharts::{
    ArtistDetail, AudiencePoint, RankingItem, RankingSong, SongArtist, SongDetail,
    SoundchartsClient, SoundchartsConfig,
};
pub use spool::{sanitize_filename, sha256_hex, LocalSpool, S3Spool, SpoolError, UploadSpool};
