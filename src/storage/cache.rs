use std::collections::HashMap;

/// 按查询字符串缓存外部搜索结果。
/// 生命周期跟随一次文档处理会话，新上传时调用 `clear` 失效。
pub struct QueryCache<T: Clone> {
    store: HashMap<String, T>,
    hits: usize,
    misses: usize,
}

impl<T: Clone> QueryCache<T> {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn key(query: &str, max_results: usize) -> String {
        format!("{}_{}", query, max_results)
    }

    pub fn get(&mut self, key: &str) -> Option<T> {
        match self.store.get(key) {
            Some(data) => {
                self.hits += 1;
                Some(data.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn set(&mut self, key: String, data: T) {
        self.store.insert(key, data);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

impl<T: Clone> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
