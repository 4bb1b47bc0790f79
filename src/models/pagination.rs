use serde::Serialize;

/// 分页请求，页码从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// 页码超过总页数时落回第一页
    pub fn within(self, total: usize) -> Self {
        let num_pages = total.div_ceil(self.per_page).max(1);
        if self.page > num_pages {
            Self { page: 1, ..self }
        } else {
            self
        }
    }
}

/// 一页数据及分页信息
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub num_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: usize) -> Self {
        let num_pages = total.div_ceil(request.per_page).max(1);
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            num_pages,
            has_next: request.page < num_pages,
            has_previous: request.page > 1,
        }
    }

    /// 对已经在内存中的完整列表分页
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let request = request.within(total);
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.per_page)
            .collect();
        Self::new(items, request, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            num_pages: self.num_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_and_flags() {
        let page = Paginated::from_vec((1..=25).collect::<Vec<_>>(), PageRequest::new(3, 10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.num_pages, 3);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn empty_list_has_one_page() {
        let page = Paginated::<i32>::from_vec(Vec::new(), PageRequest::new(0, 10));
        assert_eq!(page.page, 1);
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_next && !page.has_previous);
    }

    #[test]
    fn out_of_range_page_falls_back_to_first() {
        let request = PageRequest::new(usize::MAX, 10);
        assert_eq!(request.offset(), usize::MAX);
        assert_eq!(request.within(25).page, 1);
        assert_eq!(PageRequest::new(3, 10).within(25).page, 3);
        assert_eq!(PageRequest::new(4, 10).within(25).page, 1);

        let page = Paginated::from_vec((1..=5).collect::<Vec<_>>(), PageRequest::new(usize::MAX, 2));
        assert_eq!(page.page, 1);
        assert_eq!(page.items, vec![1, 2]);
    }
}
