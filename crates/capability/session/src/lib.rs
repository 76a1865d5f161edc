//! # 端口会话模块
//!
//! - [`PortSession`]：单台仪器的打开/关闭状态机，把传输上的文本行解码为记录后分发给订阅者
//! - [`SessionRegistry`]：按仪器 id 管理会话，保证同一仪器只有一个会话
//!
//! ```rust,ignore
//! let session = registry.session("geiger-1");
//! let id = session.subscribe(|record| println!("{:?}", record));
//! session.open().await?;
//! session.send("<GETCPM>")?;
//! session.close();
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{PortSession, PortState, TAG_COMMAND};
