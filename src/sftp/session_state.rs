use std::collections::HashMap;

pub type HandleId = String;
pub type OpenFiles<F> = HashMap<HandleId, F>;
pub type OpenDirs<D> = HashMap<HandleId, D>;

/// Stato per sessione: versione negoziata e tabelle degli handle aperti.
pub struct SessionState<F, D> {
    pub version: Option<u32>,
    pub open_files: OpenFiles<F>,
    pub open_dirs: OpenDirs<D>,
    pub handle_counter: u32,
}

impl<F, D> SessionState<F, D> {
    pub fn new() -> Self {
        Self {
            version: None,
            open_files: HashMap::new(),
            open_dirs: HashMap::new(),
            handle_counter: 0,
        }
    }

    pub fn next_handle(&mut self) -> HandleId {
        self.handle_counter += 1;
        format!("handle_{}", self.handle_counter)
    }
}

impl<F, D> Default for SessionState<F, D> {
    fn default() -> Self {
        Self::new()
    }
}
