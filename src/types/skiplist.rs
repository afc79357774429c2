// src/types/skiplist.rs

//! 有序集合使用的跳表
//!
//! - 节点放在 arena（`Vec<Node>`）里，用下标互相引用，下标 0 是头节点
//! - 删除的槽位进入 free list，后续插入复用
//! - 每层记录 span，可以 O(log n) 求排名 / 按排名定位
//! - 排序键为 (score, member)

use rand::Rng;

use crate::types::string::ByteBuffer;

const MAX_LEVEL: usize = 32;
const P: f64 = 0.25;
const HEAD: usize = 0;

#[derive(Debug, Clone, Copy, Default)]
struct Level {
    forward: Option<usize>,
    span: usize,
}

#[derive(Debug, Clone)]
struct Node {
    member: ByteBuffer,
    score: f64,
    backward: Option<usize>,
    levels: Vec<Level>,
}

#[derive(Debug, Clone)]
pub struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    tail: Option<usize>,
    length: usize,
    level: usize,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

fn random_level() -> usize {
    let mut rng = rand::thread_rng();
    let mut level = 1;
    while level < MAX_LEVEL && rng.gen_bool(P) {
        level += 1;
    }
    level
}

impl SkipList {
    pub fn new() -> Self {
        let head = Node {
            member: ByteBuffer::new(),
            score: 0.0,
            backward: None,
            levels: vec![Level::default(); MAX_LEVEL],
        };
        SkipList { nodes: vec![head], free: Vec::new(), tail: None, length: 0, level: 1 }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn forward(&self, x: usize, i: usize) -> Option<usize> {
        self.nodes[x].levels[i].forward
    }

    fn span(&self, x: usize, i: usize) -> usize {
        self.nodes[x].levels[i].span
    }

    /// 节点是否排在 (score, member) 之前
    fn precedes(&self, x: usize, score: f64, member: &[u8]) -> bool {
        let node = &self.nodes[x];
        node.score < score || (node.score == score && node.member.as_bytes() < member)
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// 每一层上最后一个排在 (score, member) 之前的节点，以及它们的排名
    fn find_update(&self, score: f64, member: &[u8]) -> ([usize; MAX_LEVEL], [usize; MAX_LEVEL]) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(f) = self.forward(x, i) {
                if !self.precedes(f, score, member) {
                    break;
                }
                rank[i] += self.span(x, i);
                x = f;
            }
            update[i] = x;
        }
        (update, rank)
    }

    /// 插入新元素；调用方保证 member 不在表中
    pub fn insert(&mut self, score: f64, member: &[u8]) {
        let (mut update, mut rank) = self.find_update(score, member);

        let level = random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEAD;
                self.nodes[HEAD].levels[i].span = self.length;
            }
            self.level = level;
        }

        let x = self.alloc(Node {
            member: ByteBuffer::from_bytes(member),
            score,
            backward: None,
            levels: vec![Level::default(); level],
        });

        for i in 0..level {
            let prev = update[i];
            let prev_level = self.nodes[prev].levels[i];
            self.nodes[x].levels[i] = Level {
                forward: prev_level.forward,
                span: prev_level.span - (rank[0] - rank[i]),
            };
            self.nodes[prev].levels[i] = Level { forward: Some(x), span: rank[0] - rank[i] + 1 };
        }
        for i in level..self.level {
            self.nodes[update[i]].levels[i].span += 1;
        }

        self.nodes[x].backward = if update[0] == HEAD { None } else { Some(update[0]) };
        match self.nodes[x].levels[0].forward {
            Some(f) => self.nodes[f].backward = Some(x),
            None => self.tail = Some(x),
        }
        self.length += 1;
    }

    /// 删除指定元素，返回是否存在
    pub fn delete(&mut self, score: f64, member: &[u8]) -> bool {
        let (update, _) = self.find_update(score, member);
        match self.forward(update[0], 0) {
            Some(x) if self.nodes[x].score == score && self.nodes[x].member.as_bytes() == member => {
                self.unlink(x, &update);
                true
            }
            _ => false,
        }
    }

    fn unlink(&mut self, x: usize, update: &[usize; MAX_LEVEL]) {
        for i in 0..self.level {
            let prev = update[i];
            if self.nodes[prev].levels[i].forward == Some(x) {
                let removed = self.nodes[x].levels[i];
                let level = &mut self.nodes[prev].levels[i];
                level.span = level.span + removed.span - 1;
                level.forward = removed.forward;
            } else {
                self.nodes[prev].levels[i].span -= 1;
            }
        }
        let backward = self.nodes[x].backward;
        match self.nodes[x].levels[0].forward {
            Some(f) => self.nodes[f].backward = backward,
            None => self.tail = backward,
        }
        while self.level > 1 && self.nodes[HEAD].levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }
        self.length -= 1;

        let node = &mut self.nodes[x];
        node.member = ByteBuffer::new();
        node.levels.clear();
        node.backward = None;
        self.free.push(x);
    }

    /// 修改分数：先删后插
    pub fn update_score(&mut self, old_score: f64, member: &[u8], new_score: f64) {
        if self.delete(old_score, member) {
            self.insert(new_score, member);
        }
    }

    /// 从 1 开始的排名
    pub fn rank(&self, score: f64, member: &[u8]) -> Option<usize> {
        let mut x = HEAD;
        let mut rank = 0;
        for i in (0..self.level).rev() {
            while let Some(f) = self.forward(x, i) {
                let node = &self.nodes[f];
                let le = node.score < score || (node.score == score && node.member.as_bytes() <= member);
                if !le {
                    break;
                }
                rank += self.span(x, i);
                x = f;
            }
            if x != HEAD && self.nodes[x].member.as_bytes() == member {
                return Some(rank);
            }
        }
        None
    }

    /// 按从 1 开始的排名定位节点
    fn node_by_rank(&self, rank: usize) -> Option<usize> {
        if rank == 0 || rank > self.length {
            return None;
        }
        let mut x = HEAD;
        let mut traversed = 0;
        for i in (0..self.level).rev() {
            while let Some(f) = self.forward(x, i) {
                if traversed + self.span(x, i) > rank {
                    break;
                }
                traversed += self.span(x, i);
                x = f;
            }
            if traversed == rank {
                return Some(x);
            }
        }
        None
    }

    /// 第一个分数落在 `[min, max]` 的节点
    fn first_in_range(&self, min: f64, max: f64) -> Option<usize> {
        if min > max {
            return None;
        }
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(f) = self.forward(x, i) {
                if self.nodes[f].score >= min {
                    break;
                }
                x = f;
            }
        }
        let x = self.forward(x, 0)?;
        (self.nodes[x].score <= max).then_some(x)
    }

    /// 最后一个分数落在 `[min, max]` 的节点
    fn last_in_range(&self, min: f64, max: f64) -> Option<usize> {
        if min > max {
            return None;
        }
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(f) = self.forward(x, i) {
                if self.nodes[f].score > max {
                    break;
                }
                x = f;
            }
        }
        (x != HEAD && self.nodes[x].score >= min).then_some(x)
    }

    /// 分数在闭区间内的元素个数
    pub fn count_in_range(&self, min: f64, max: f64) -> usize {
        let (Some(first), Some(last)) = (self.first_in_range(min, max), self.last_in_range(min, max)) else {
            return 0;
        };
        let rank_of = |x: usize| self.rank(self.nodes[x].score, self.nodes[x].member.as_bytes()).unwrap_or(0);
        (rank_of(last) + 1).saturating_sub(rank_of(first))
    }

    /// 从 0 开始的排名 `start` 起正向遍历
    pub fn iter_from_rank(&self, start: usize) -> SkipIter<'_> {
        SkipIter { list: self, next: self.node_by_rank(start + 1), reverse: false }
    }

    /// 从 0 开始的排名 `start` 起反向遍历
    pub fn iter_rev_from_rank(&self, start: usize) -> SkipIter<'_> {
        SkipIter { list: self, next: self.node_by_rank(start + 1), reverse: true }
    }

    /// 从第一个分数 >= min 的元素开始正向遍历（调用方负责在 max 处停止）
    pub fn iter_from_score(&self, min: f64, max: f64) -> SkipIter<'_> {
        SkipIter { list: self, next: self.first_in_range(min, max), reverse: false }
    }

    pub fn iter(&self) -> SkipIter<'_> {
        SkipIter { list: self, next: self.forward(HEAD, 0), reverse: false }
    }

    /// 最后一个元素
    pub fn last(&self) -> Option<(&[u8], f64)> {
        self.tail.map(|x| (self.nodes[x].member.as_bytes(), self.nodes[x].score))
    }
}

pub struct SkipIter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
    reverse: bool,
}

impl<'a> Iterator for SkipIter<'a> {
    type Item = (&'a [u8], f64);

    fn next(&mut self) -> Option<Self::Item> {
        let x = self.next?;
        let node = &self.list.nodes[x];
        self.next = if self.reverse { node.backward } else { node.levels[0].forward };
        Some((node.member.as_bytes(), node.score))
    }
}
