use std::collections::HashMap;
use std::collections::VecDeque;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::errors::Result;


/// Durable queue collaborator.
///
/// The queue is the only resource shared between span producers and the
/// relay consumer. `pop` must be atomic per message (at most one consumer
/// receives it); that guarantee is delegated to the implementation, not
/// layered on top here.
pub trait SpanQueue: Send + Sync {
    /// Append a payload to the tail of the named queue.
    fn push(&self, queue: &str, payload: &str) -> Result<()>;

    /// Pop one payload from the head of the named queue.
    ///
    /// Non-blocking: returns `None` immediately when the queue is empty.
    fn pop(&self, queue: &str) -> Result<Option<String>>;
}


/// In-process queue for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
}

impl MemoryQueue {
    pub fn new() -> MemoryQueue {
        MemoryQueue::default()
    }

    pub fn len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .expect("queue lock poisoned")
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }
}

impl SpanQueue for MemoryQueue {
    fn push(&self, queue: &str, payload: &str) -> Result<()> {
        self.queues
            .lock()
            .expect("queue lock poisoned")
            .entry(String::from(queue))
            .or_default()
            .push_back(String::from(payload));
        Ok(())
    }

    fn pop(&self, queue: &str) -> Result<Option<String>> {
        Ok(self
            .queues
            .lock()
            .expect("queue lock poisoned")
            .get_mut(queue)
            .and_then(VecDeque::pop_front))
    }
}


/// File-backed queue: one append-only file of newline-separated payloads
/// per queue name.
///
/// Durable across restarts of a single process. Pops rewrite the file
/// without the head line; a lock serialises in-process access, cross
/// process consumers are not supported.
#[derive(Debug)]
pub struct FileQueue {
    directory: PathBuf,
    lock: Mutex<()>,
}

impl FileQueue {
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<FileQueue> {
        fs::create_dir_all(&directory)?;
        Ok(FileQueue {
            directory: directory.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn queue_path(&self, queue: &str) -> PathBuf {
        let safe: String = queue
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.directory.join(format!("{}.queue", safe))
    }
}

impl SpanQueue for FileQueue {
    fn push(&self, queue: &str, payload: &str) -> Result<()> {
        let _guard = self.lock.lock().expect("queue lock poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.queue_path(queue))?;
        // Payloads are single-line JSON; the newline is the frame marker.
        writeln!(file, "{}", payload)?;
        Ok(())
    }

    fn pop(&self, queue: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().expect("queue lock poisoned");
        let path = self.queue_path(queue);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let mut lines = contents.lines();
        let head = match lines.next() {
            Some(head) => String::from(head),
            None => return Ok(None),
        };
        let rest: Vec<&str> = lines.collect();
        if rest.is_empty() {
            fs::write(&path, "")?;
        } else {
            fs::write(&path, format!("{}\n", rest.join("\n")))?;
        }
        Ok(Some(head))
    }
}
