// SPDX-License-Identifier: MPL-2.0
//! Locating libopus and binding its entry points.
//!
//! The library is resolved at most once per process, on first use, and lives
//! until the process exits. A failed resolution is remembered too, so every
//! codec operation afterwards reports the same error instead of retrying.
use crate::{
	abi::OpusAbi,
	error::{Error, Result},
};
use earshot_opus_sys::{self as sys, symbols, OpusDecoder, OpusEncoder};
use libloading::Library;
use std::{
	ffi::CStr,
	fmt::{self, Debug, Formatter},
	os::raw::c_int,
	path::PathBuf,
	sync::OnceLock,
};

/// Environment variable naming a libopus shared library to load instead of
/// searching the platform's default names.
pub const LIBRARY_PATH_ENV: &str = "EARSHOT_OPUS_LIBRARY";

#[cfg(any(target_os = "macos", target_os = "ios"))]
const CANDIDATES: &[&str] = &[
	"libopus.0.dylib",
	"libopus.dylib",
	"/opt/homebrew/lib/libopus.0.dylib",
	"/usr/local/lib/libopus.0.dylib",
];
#[cfg(windows)]
const CANDIDATES: &[&str] = &["opus.dll", "libopus-0.dll", "libopus.dll"];
#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
const CANDIDATES: &[&str] = &["libopus.so.0", "libopus.so"];
#[cfg(not(any(unix, windows)))]
const CANDIDATES: &[&str] = &[];

/// How the entry points are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingStrategy {
	/// Open a shared library from the loader's search path.
	Dynamic,
	/// Look the symbols up in the running process image, where the host
	/// application already linked libopus.
	Process,
	/// Use the bundled libopus linked in by the `static` feature.
	Linked,
}

impl BindingStrategy {
	/// The strategy for the platform this crate was built for.
	pub fn for_host() -> Result<Self> {
		if cfg!(feature = "static") {
			Ok(Self::Linked)
		} else if cfg!(target_os = "ios") {
			Ok(Self::Process)
		} else if cfg!(any(unix, windows)) {
			Ok(Self::Dynamic)
		} else {
			Err(Error::UnsupportedPlatform(std::env::consts::OS))
		}
	}
}

/// Where to find libopus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorConfig {
	/// An explicit shared library to open. Implies [`BindingStrategy::Dynamic`]
	/// unless `strategy` says otherwise.
	pub library_path: Option<PathBuf>,
	/// Overrides [`BindingStrategy::for_host`].
	pub strategy: Option<BindingStrategy>,
}

impl LocatorConfig {
	/// Reads [`LIBRARY_PATH_ENV`]; an empty value counts as unset.
	pub fn from_env() -> Self {
		Self {
			library_path: std::env::var_os(LIBRARY_PATH_ENV)
				.filter(|path| !path.is_empty())
				.map(PathBuf::from),
			strategy: None,
		}
	}

	pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.library_path = Some(path.into());
		self
	}

	pub fn with_strategy(mut self, strategy: BindingStrategy) -> Self {
		self.strategy = Some(strategy);
		self
	}

	fn strategy(&self) -> Result<BindingStrategy> {
		match (self.strategy, &self.library_path) {
			(Some(strategy), _) => Ok(strategy),
			(None, Some(_)) => Ok(BindingStrategy::Dynamic),
			(None, None) => BindingStrategy::for_host(),
		}
	}
}

/// The resolved libopus entry points.
pub struct OpusLibrary {
	strategy: BindingStrategy,
	origin: String,
	encoder_create: sys::opus_encoder_create_fn,
	encode: sys::opus_encode_fn,
	encoder_ctl: sys::opus_encoder_ctl_fn,
	encoder_destroy: sys::opus_encoder_destroy_fn,
	decoder_create: sys::opus_decoder_create_fn,
	decode: sys::opus_decode_fn,
	decoder_ctl: sys::opus_decoder_ctl_fn,
	decoder_destroy: sys::opus_decoder_destroy_fn,
	version_string: sys::opus_get_version_string_fn,
	// Keeps the entry points above mapped.
	_library: Option<Library>,
}

impl OpusLibrary {
	/// Makes one resolution attempt, without touching the process-wide
	/// library. Prefer [`resolve`] unless you manage the lifetime yourself.
	pub fn load(config: &LocatorConfig) -> Result<Self> {
		match config.strategy()? {
			BindingStrategy::Dynamic => Self::open_dynamic(config),
			BindingStrategy::Process => Self::open_process(),
			BindingStrategy::Linked => Self::linked(),
		}
	}

	pub fn strategy(&self) -> BindingStrategy {
		self.strategy
	}

	/// The path or description of where the entry points came from.
	pub fn origin(&self) -> &str {
		&self.origin
	}

	fn open_dynamic(config: &LocatorConfig) -> Result<Self> {
		let candidates: Vec<PathBuf> = match &config.library_path {
			Some(path) => vec![path.clone()],
			None => CANDIDATES.iter().map(PathBuf::from).collect(),
		};
		if candidates.is_empty() {
			return Err(Error::UnsupportedPlatform(std::env::consts::OS));
		}
		let mut failures = Vec::with_capacity(candidates.len());
		for candidate in &candidates {
			tracing::debug!(library = %candidate.display(), "trying libopus candidate");
			// SAFETY: libopus runs no initialization routines on load.
			match unsafe { Library::new(candidate) } {
				Ok(library) => {
					return Self::bind(
						BindingStrategy::Dynamic,
						candidate.display().to_string(),
						library,
					)
				}
				Err(err) => failures.push(format!("{}: {err}", candidate.display())),
			}
		}
		Err(Error::LibraryResolutionFailed {
			library: candidates
				.iter()
				.map(|candidate| candidate.display().to_string())
				.collect::<Vec<_>>()
				.join(", "),
			reason: failures.join("; "),
		})
	}

	#[cfg(unix)]
	fn open_process() -> Result<Self> {
		let library: Library = libloading::os::unix::Library::this().into();
		Self::bind(BindingStrategy::Process, "process image".to_owned(), library)
	}

	#[cfg(windows)]
	fn open_process() -> Result<Self> {
		let library: Library = libloading::os::windows::Library::this()
			.map_err(|err| Error::LibraryResolutionFailed {
				library: "process image".to_owned(),
				reason: err.to_string(),
			})?
			.into();
		Self::bind(BindingStrategy::Process, "process image".to_owned(), library)
	}

	#[cfg(not(any(unix, windows)))]
	fn open_process() -> Result<Self> {
		Err(Error::UnsupportedPlatform(std::env::consts::OS))
	}

	#[cfg(feature = "static")]
	fn linked() -> Result<Self> {
		use earshot_opus_sys::linked;
		Ok(Self {
			strategy: BindingStrategy::Linked,
			origin: "statically linked libopus".to_owned(),
			encoder_create: linked::opus_encoder_create,
			encode: linked::opus_encode,
			encoder_ctl: linked::opus_encoder_ctl,
			encoder_destroy: linked::opus_encoder_destroy,
			decoder_create: linked::opus_decoder_create,
			decode: linked::opus_decode,
			decoder_ctl: linked::opus_decoder_ctl,
			decoder_destroy: linked::opus_decoder_destroy,
			version_string: linked::opus_get_version_string,
			_library: None,
		})
	}

	#[cfg(not(feature = "static"))]
	fn linked() -> Result<Self> {
		Err(Error::LibraryResolutionFailed {
			library: "statically linked libopus".to_owned(),
			reason: "built without the `static` feature".to_owned(),
		})
	}

	fn bind(strategy: BindingStrategy, origin: String, library: Library) -> Result<Self> {
		Ok(Self {
			strategy,
			encoder_create: symbol(&library, &origin, symbols::OPUS_ENCODER_CREATE)?,
			encode: symbol(&library, &origin, symbols::OPUS_ENCODE)?,
			encoder_ctl: symbol(&library, &origin, symbols::OPUS_ENCODER_CTL)?,
			encoder_destroy: symbol(&library, &origin, symbols::OPUS_ENCODER_DESTROY)?,
			decoder_create: symbol(&library, &origin, symbols::OPUS_DECODER_CREATE)?,
			decode: symbol(&library, &origin, symbols::OPUS_DECODE)?,
			decoder_ctl: symbol(&library, &origin, symbols::OPUS_DECODER_CTL)?,
			decoder_destroy: symbol(&library, &origin, symbols::OPUS_DECODER_DESTROY)?,
			version_string: symbol(&library, &origin, symbols::OPUS_GET_VERSION_STRING)?,
			origin,
			_library: Some(library),
		})
	}
}

fn symbol<T: Copy>(library: &Library, origin: &str, name: &[u8]) -> Result<T> {
	// SAFETY: every `T` used here is the fn pointer type declared for `name`
	// in the sys crate, matching the libopus headers.
	unsafe { library.get::<T>(name) }
		.map(|symbol| *symbol)
		.map_err(|err| Error::LibraryResolutionFailed {
			library: origin.to_owned(),
			reason: format!(
				"missing `{}`: {err}",
				String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name))
			),
		})
}

impl Debug for OpusLibrary {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("OpusLibrary")
			.field("strategy", &self.strategy)
			.field("origin", &self.origin)
			.finish_non_exhaustive()
	}
}

impl OpusAbi for OpusLibrary {
	unsafe fn encoder_create(
		&self,
		sample_rate: i32,
		channels: c_int,
		application: c_int,
		error: *mut c_int,
	) -> *mut OpusEncoder {
		(self.encoder_create)(sample_rate, channels, application, error)
	}

	unsafe fn encode(
		&self,
		st: *mut OpusEncoder,
		pcm: *const i16,
		frame_size: c_int,
		data: *mut u8,
		max_data_bytes: i32,
	) -> i32 {
		(self.encode)(st, pcm, frame_size, data, max_data_bytes)
	}

	unsafe fn encoder_ctl(&self, st: *mut OpusEncoder, request: c_int, value: i32) -> c_int {
		(self.encoder_ctl)(st, request, value)
	}

	unsafe fn encoder_ctl_get(
		&self,
		st: *mut OpusEncoder,
		request: c_int,
		out: *mut i32,
	) -> c_int {
		(self.encoder_ctl)(st, request, out)
	}

	unsafe fn encoder_destroy(&self, st: *mut OpusEncoder) {
		(self.encoder_destroy)(st)
	}

	unsafe fn decoder_create(
		&self,
		sample_rate: i32,
		channels: c_int,
		error: *mut c_int,
	) -> *mut OpusDecoder {
		(self.decoder_create)(sample_rate, channels, error)
	}

	unsafe fn decode(
		&self,
		st: *mut OpusDecoder,
		data: *const u8,
		len: i32,
		pcm: *mut i16,
		frame_size: c_int,
		decode_fec: c_int,
	) -> c_int {
		(self.decode)(st, data, len, pcm, frame_size, decode_fec)
	}

	unsafe fn decoder_ctl(&self, st: *mut OpusDecoder, request: c_int, value: i32) -> c_int {
		(self.decoder_ctl)(st, request, value)
	}

	unsafe fn decoder_ctl_get(
		&self,
		st: *mut OpusDecoder,
		request: c_int,
		out: *mut i32,
	) -> c_int {
		(self.decoder_ctl)(st, request, out)
	}

	unsafe fn decoder_destroy(&self, st: *mut OpusDecoder) {
		(self.decoder_destroy)(st)
	}

	fn version(&self) -> String {
		// SAFETY: libopus returns a pointer to a static, NUL-terminated string.
		let version = unsafe { (self.version_string)() };
		if version.is_null() {
			return String::new();
		}
		unsafe { CStr::from_ptr(version) }
			.to_string_lossy()
			.into_owned()
	}
}

static LIBRARY: OnceLock<Result<OpusLibrary>> = OnceLock::new();

/// Returns the process-wide libopus, resolving it on the first call with
/// [`LocatorConfig::from_env`].
pub fn resolve() -> Result<&'static OpusLibrary> {
	resolve_once(LocatorConfig::from_env)
}

/// Like [`resolve`], with an explicit configuration.
///
/// The configuration only applies if this call is the one that resolves the
/// library; once resolved (or failed), the first outcome is returned.
pub fn resolve_with(config: &LocatorConfig) -> Result<&'static OpusLibrary> {
	resolve_once(|| config.clone())
}

fn resolve_once(config: impl FnOnce() -> LocatorConfig) -> Result<&'static OpusLibrary> {
	LIBRARY
		.get_or_init(|| {
			let result = OpusLibrary::load(&config());
			match &result {
				Ok(library) => tracing::info!(
					strategy = ?library.strategy(),
					origin = library.origin(),
					version = %library.version(),
					"resolved libopus"
				),
				Err(err) => tracing::warn!(%err, "libopus is unavailable; codec operations will fail"),
			}
			result
		})
		.as_ref()
		.map_err(Clone::clone)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn host_strategy() {
		let strategy = BindingStrategy::for_host();
		if cfg!(feature = "static") {
			assert_eq!(strategy, Ok(BindingStrategy::Linked));
		} else if cfg!(any(target_os = "linux", target_os = "macos", windows)) {
			assert_eq!(strategy, Ok(BindingStrategy::Dynamic));
		}
	}

	#[test]
	fn explicit_path_implies_dynamic() {
		let config = LocatorConfig::default().with_library_path("/nowhere/libopus.so");
		assert_eq!(config.strategy(), Ok(BindingStrategy::Dynamic));
		let config = config.with_strategy(BindingStrategy::Process);
		assert_eq!(config.strategy(), Ok(BindingStrategy::Process));
	}

	#[test]
	fn missing_library_is_a_resolution_failure() {
		let config = LocatorConfig::default().with_library_path("/nowhere/libopus-missing.so");
		match OpusLibrary::load(&config) {
			Err(Error::LibraryResolutionFailed { library, .. }) => {
				assert!(library.contains("libopus-missing"));
			}
			other => panic!("expected a resolution failure, got {other:?}"),
		}
	}

	#[cfg(all(unix, not(feature = "static")))]
	#[test]
	fn missing_symbols_are_a_resolution_failure() {
		// The test binary doesn't link libopus, so the process image lacks it.
		let config = LocatorConfig::default().with_strategy(BindingStrategy::Process);
		match OpusLibrary::load(&config) {
			Err(Error::LibraryResolutionFailed { reason, .. }) => {
				assert!(reason.contains("opus_encoder_create"), "{reason}");
			}
			other => panic!("expected a resolution failure, got {other:?}"),
		}
	}

	#[cfg(not(feature = "static"))]
	#[test]
	fn linked_needs_static_feature() {
		let config = LocatorConfig::default().with_strategy(BindingStrategy::Linked);
		assert!(matches!(
			OpusLibrary::load(&config),
			Err(Error::LibraryResolutionFailed { .. })
		));
	}

	#[test]
	fn resolution_is_memoized() {
		let first = resolve().map(|library| library as *const OpusLibrary);
		let second = resolve_with(&LocatorConfig::default().with_library_path("/elsewhere"))
			.map(|library| library as *const OpusLibrary);
		assert_eq!(first, second);
	}
}
